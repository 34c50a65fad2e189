//! Viewer renderer: a pure projection of a snapshot into paint instructions
//!
//! Both passive surfaces and the editor canvas go through [`render`]. Items
//! come out in paint order (later paints on top). The HTML emitter turns a
//! frame into a standalone page that a browser source can capture.

use std::fmt::Write as _;

use crate::layer::{Geometry, Layer, LayerContent, LayerId, ShapeType};
use crate::selection::Selection;

/// How an image fills its box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fit {
    /// Scale to fit inside the box, preserving aspect ratio
    Contain,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Corners {
    Radius(f64),
    /// Fully rounded (circles)
    Round,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Image {
        src: String,
        fit: Fit,
    },
    Text {
        text: String,
        font_family: String,
        font_size: f64,
        color: String,
        bold: bool,
        italic: bool,
    },
    Shape {
        fill: String,
        stroke: String,
        stroke_width: f64,
        corners: Corners,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderItem {
    pub id: LayerId,
    pub geometry: Geometry,
    pub opacity: f64,
    /// Only ever set on editor frames
    pub selected: bool,
    pub paint: Paint,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub items: Vec<RenderItem>,
}

/// Frame for a passive viewer, in stored order
pub fn render(snapshot: &[Layer]) -> Frame {
    Frame {
        items: snapshot.iter().map(|layer| item(layer, false)).collect(),
    }
}

/// Frame for the editor canvas
///
/// Selected layers are painted last so they sit on top while being edited.
/// Relative order within each group is kept; the stored order is untouched.
pub fn render_editor(snapshot: &[Layer], selection: &Selection) -> Frame {
    let (selected, rest): (Vec<&Layer>, Vec<&Layer>) =
        snapshot.iter().partition(|layer| selection.contains(&layer.id));
    let items = rest
        .into_iter()
        .map(|layer| item(layer, false))
        .chain(selected.into_iter().map(|layer| item(layer, true)))
        .collect();
    Frame { items }
}

fn item(layer: &Layer, selected: bool) -> RenderItem {
    let paint = match &layer.content {
        LayerContent::Image(image) => Paint::Image {
            src: image.src.clone(),
            fit: Fit::Contain,
        },
        LayerContent::Text(text) => Paint::Text {
            text: text.text.clone(),
            font_family: text.font_family.clone(),
            font_size: text.font_size,
            color: text.color.clone(),
            bold: text.is_bold(),
            italic: text.is_italic(),
        },
        LayerContent::Shape(shape) => Paint::Shape {
            fill: shape.fill.clone(),
            stroke: shape.stroke.clone(),
            stroke_width: shape.stroke_width,
            corners: match shape.shape_type {
                ShapeType::Rect => Corners::Radius(shape.border_radius),
                ShapeType::Circle => Corners::Round,
            },
        },
    };
    RenderItem {
        id: layer.id.clone(),
        geometry: layer.geometry,
        opacity: layer.opacity,
        selected,
        paint,
    }
}

impl Frame {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Standalone HTML page for the frame
    ///
    /// With `background` the layers sit over an embedded page (the preview
    /// surface); without it the page is fully transparent (the overlay).
    pub fn to_html(&self, background: Option<&str>) -> String {
        let mut html = String::from(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Overlay</title>\n\
             <style>html,body{margin:0;padding:0;background:transparent;overflow:hidden}\
             .canvas{position:relative;width:100vw;height:100vh}\
             .layer{position:absolute;box-sizing:border-box}</style>\n</head>\n<body>\n<div class=\"canvas\">\n",
        );

        if let Some(url) = background {
            let _ = writeln!(
                html,
                "<iframe src=\"{}\" style=\"position:absolute;left:0;top:0;width:100%;height:100%;border:0\" \
                 allow=\"autoplay; encrypted-media\" allowfullscreen></iframe>",
                escape(url)
            );
        }

        for (z, item) in self.items.iter().enumerate() {
            write_item(&mut html, item, z + 1);
        }

        html.push_str("</div>\n</body>\n</html>\n");
        html
    }
}

fn write_item(html: &mut String, item: &RenderItem, z: usize) {
    let g = &item.geometry;
    let mut style = format!(
        "left:{}px;top:{}px;width:{}px;height:{}px;opacity:{};z-index:{}",
        g.x, g.y, g.width, g.height, item.opacity, z
    );

    let body = match &item.paint {
        Paint::Image { src, fit: Fit::Contain } => format!(
            "<img src=\"{}\" alt=\"\" style=\"width:100%;height:100%;object-fit:contain\">",
            escape(src)
        ),
        Paint::Text {
            text,
            font_family,
            font_size,
            color,
            bold,
            italic,
        } => {
            let _ = write!(
                style,
                ";font-family:{};font-size:{}px;color:{};font-weight:{};font-style:{};white-space:pre-wrap",
                font_family,
                font_size,
                color,
                if *bold { "bold" } else { "normal" },
                if *italic { "italic" } else { "normal" },
            );
            escape(text)
        }
        Paint::Shape {
            fill,
            stroke,
            stroke_width,
            corners,
        } => {
            let radius = match corners {
                Corners::Radius(r) => format!("{r}px"),
                Corners::Round => "50%".to_string(),
            };
            let _ = write!(
                style,
                ";background:{fill};border:{stroke_width}px solid {stroke};border-radius:{radius}"
            );
            String::new()
        }
    };

    let _ = writeln!(
        html,
        "<div class=\"layer\" data-id=\"{}\" style=\"{}\">{}</div>",
        escape(item.id.as_str()),
        escape(&style),
        body
    );
}

/// Escape text for HTML content and double- or single-quoted attributes
fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
