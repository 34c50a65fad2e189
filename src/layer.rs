//! Overlay layer entity model
//!
//! A layer is one positioned visual element on the overlay canvas. The
//! kind-specific payload is a tagged variant so image, text and shape layers
//! share one store and one renderer.
//!
//! JSON shape (what the persistence file and the sync wire carry):
//! `{ "id", "name", "x", "y", "width", "height", "opacity", "type", ...kind fields }`

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::constants::{defaults, limits};

/// One committed (or live) state of the canvas, in paint order
pub type Snapshot = Vec<Layer>;

/// Opaque unique layer identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(String);

impl LayerId {
    /// Fresh identifier, never handed out twice
    pub fn generate() -> Self {
        Self(format!("resource-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LayerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for LayerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Image,
    Text,
    Shape,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LayerKind::Image => "image",
            LayerKind::Text => "text",
            LayerKind::Shape => "shape",
        })
    }
}

/// Top-left position and size in canvas units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Geometry {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Width and height must be positive, everything must be finite
    pub fn validate(&self) -> Result<(), LayerError> {
        let finite = [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.width <= 0.0 || self.height <= 0.0 {
            return Err(LayerError::InvalidGeometry {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextStyle {
    Bold,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
    Rect,
    Circle,
}

impl ShapeType {
    fn label(&self, locale: Locale) -> &'static str {
        match (self, locale) {
            (ShapeType::Rect, Locale::En) => "Rectangle",
            (ShapeType::Circle, Locale::En) => "Circle",
            (ShapeType::Rect, Locale::Ko) => "사각형",
            (ShapeType::Circle, Locale::Ko) => "원",
        }
    }
}

/// Language used for derived display names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ko,
}

impl Locale {
    fn text_prefix(&self) -> &'static str {
        match self {
            Locale::En => "Text: ",
            Locale::Ko => "텍스트: ",
        }
    }

    fn shape_prefix(&self) -> &'static str {
        match self {
            Locale::En => "Shape: ",
            Locale::Ko => "도형: ",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    /// Resolvable URL or file reference, read-only after creation
    pub src: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    pub text: String,
    pub font_family: String,
    pub font_size: f64,
    pub color: String,
    #[serde(default)]
    pub text_styles: BTreeSet<TextStyle>,
}

impl TextContent {
    pub fn is_bold(&self) -> bool {
        self.text_styles.contains(&TextStyle::Bold)
    }

    pub fn is_italic(&self) -> bool {
        self.text_styles.contains(&TextStyle::Italic)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeContent {
    pub shape_type: ShapeType,
    pub fill: String,
    pub stroke: String,
    pub stroke_width: f64,
    /// Only meaningful for rectangles
    pub border_radius: f64,
}

/// Kind-specific layer payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LayerContent {
    Image(ImageContent),
    Text(TextContent),
    Shape(ShapeContent),
}

impl LayerContent {
    pub fn kind(&self) -> LayerKind {
        match self {
            LayerContent::Image(_) => LayerKind::Image,
            LayerContent::Text(_) => LayerKind::Text,
            LayerContent::Shape(_) => LayerKind::Shape,
        }
    }
}

fn default_opacity() -> f64 {
    defaults::OPACITY
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    #[serde(flatten)]
    pub geometry: Geometry,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(flatten)]
    pub content: LayerContent,
}

impl Layer {
    pub fn kind(&self) -> LayerKind {
        self.content.kind()
    }

    pub fn is_image(&self) -> bool {
        self.kind() == LayerKind::Image
    }

    /// Check geometry plus the value ranges of the kind-specific fields
    pub fn validate(&self) -> Result<(), LayerError> {
        validate_geometry(self)?;
        check_opacity(self.opacity)?;
        match &self.content {
            LayerContent::Image(image) => {
                if image.src.is_empty() {
                    return Err(LayerError::MissingField { kind: LayerKind::Image, field: "src" });
                }
            }
            LayerContent::Text(text) => check_font_size(text.font_size)?,
            LayerContent::Shape(shape) => {
                check_non_negative("strokeWidth", shape.stroke_width)?;
                check_non_negative("borderRadius", shape.border_radius)?;
            }
        }
        Ok(())
    }

    /// Produce the patched layer without touching `self`
    ///
    /// Text layers re-derive their name when `text` changes, shape layers
    /// when `shapeType` changes.
    pub fn patched(&self, patch: &LayerPatch, locale: Locale) -> Result<Layer, LayerError> {
        patch.check_applicable(self.kind())?;

        let mut next = self.clone();
        if let Some(name) = &patch.name {
            next.name = name.clone();
        }
        if let Some(x) = patch.x {
            next.geometry.x = x;
        }
        if let Some(y) = patch.y {
            next.geometry.y = y;
        }
        if let Some(width) = patch.width {
            next.geometry.width = width;
        }
        if let Some(height) = patch.height {
            next.geometry.height = height;
        }
        if let Some(opacity) = patch.opacity {
            next.opacity = opacity;
        }

        let mut rename = false;
        match &mut next.content {
            LayerContent::Image(_) => {}
            LayerContent::Text(text) => {
                if let Some(value) = &patch.text {
                    text.text = value.clone();
                    rename = true;
                }
                if let Some(value) = &patch.font_family {
                    text.font_family = value.clone();
                }
                if let Some(value) = patch.font_size {
                    text.font_size = value;
                }
                if let Some(value) = &patch.color {
                    text.color = value.clone();
                }
                if let Some(value) = &patch.text_styles {
                    text.text_styles = value.clone();
                }
            }
            LayerContent::Shape(shape) => {
                if let Some(value) = patch.shape_type {
                    shape.shape_type = value;
                    rename = true;
                }
                if let Some(value) = &patch.fill {
                    shape.fill = value.clone();
                }
                if let Some(value) = &patch.stroke {
                    shape.stroke = value.clone();
                }
                if let Some(value) = patch.stroke_width {
                    shape.stroke_width = value;
                }
                if let Some(value) = patch.border_radius {
                    shape.border_radius = value;
                }
            }
        }
        if rename {
            next.name = derive_display_name(&next, locale);
        }

        next.validate()?;
        Ok(next)
    }
}

/// Geometry check used before any resize lands in the store
pub fn validate_geometry(layer: &Layer) -> Result<(), LayerError> {
    layer.geometry.validate()
}

/// Label shown in layer lists
///
/// Text is cut to 10 characters plus an ellipsis, shapes map to a localized
/// label, images keep their filename.
pub fn derive_display_name(layer: &Layer, locale: Locale) -> String {
    match &layer.content {
        LayerContent::Text(text) => text_name(&text.text, locale),
        LayerContent::Shape(shape) => shape_name(shape.shape_type, locale),
        LayerContent::Image(image) => {
            if layer.name.is_empty() {
                filename_from_src(&image.src)
            } else {
                layer.name.clone()
            }
        }
    }
}

fn text_name(text: &str, locale: Locale) -> String {
    let head: String = text.chars().take(limits::NAME_TEXT_CHARS).collect();
    let ellipsis = if text.chars().count() > limits::NAME_TEXT_CHARS { "..." } else { "" };
    format!("{}{}{}", locale.text_prefix(), head, ellipsis)
}

fn shape_name(shape_type: ShapeType, locale: Locale) -> String {
    format!("{}{}", locale.shape_prefix(), shape_type.label(locale))
}

fn filename_from_src(src: &str) -> String {
    src.rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty())
        .unwrap_or(src)
        .to_string()
}

fn check_opacity(opacity: f64) -> Result<(), LayerError> {
    if !(0.0..=1.0).contains(&opacity) {
        return Err(LayerError::OpacityOutOfRange(opacity));
    }
    Ok(())
}

fn check_font_size(size: f64) -> Result<(), LayerError> {
    if !(limits::MIN_FONT_SIZE..=limits::MAX_FONT_SIZE).contains(&size) {
        return Err(LayerError::FontSizeOutOfRange(size));
    }
    Ok(())
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), LayerError> {
    if !value.is_finite() || value < 0.0 {
        return Err(LayerError::NegativeValue { field, value });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayerError {
    #[error("layer size must be positive and finite (got {width}x{height})")]
    InvalidGeometry { width: f64, height: f64 },

    #[error("{kind} layer is missing required field '{field}'")]
    MissingField { kind: LayerKind, field: &'static str },

    #[error("text layers need non-empty text")]
    EmptyText,

    #[error("font size {0} is outside 10..=400")]
    FontSizeOutOfRange(f64),

    #[error("opacity {0} is outside 0..=1")]
    OpacityOutOfRange(f64),

    #[error("'{field}' must be zero or greater (got {value})")]
    NegativeValue { field: &'static str, value: f64 },

    #[error("field '{field}' does not apply to {kind} layers")]
    FieldNotApplicable { field: &'static str, kind: LayerKind },
}

/// Partial update merged by `updateLayer`
///
/// `src` is deliberately absent: image sources are read-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayerPatch {
    pub name: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub opacity: Option<f64>,
    pub text: Option<String>,
    pub font_family: Option<String>,
    pub font_size: Option<f64>,
    pub color: Option<String>,
    pub text_styles: Option<BTreeSet<TextStyle>>,
    pub shape_type: Option<ShapeType>,
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub stroke_width: Option<f64>,
    pub border_radius: Option<f64>,
}

impl LayerPatch {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            text: Some(value.into()),
            ..Self::default()
        }
    }

    fn check_applicable(&self, kind: LayerKind) -> Result<(), LayerError> {
        let text_fields = [
            ("text", self.text.is_some()),
            ("fontFamily", self.font_family.is_some()),
            ("fontSize", self.font_size.is_some()),
            ("color", self.color.is_some()),
            ("textStyles", self.text_styles.is_some()),
        ];
        let shape_fields = [
            ("shapeType", self.shape_type.is_some()),
            ("fill", self.fill.is_some()),
            ("stroke", self.stroke.is_some()),
            ("strokeWidth", self.stroke_width.is_some()),
            ("borderRadius", self.border_radius.is_some()),
        ];

        let foreign: Vec<(&'static str, bool)> = match kind {
            LayerKind::Image => text_fields.into_iter().chain(shape_fields).collect(),
            LayerKind::Text => shape_fields.to_vec(),
            LayerKind::Shape => text_fields.to_vec(),
        };
        match foreign.into_iter().find(|(_, set)| *set) {
            Some((field, _)) => Err(LayerError::FieldNotApplicable { field, kind }),
            None => Ok(()),
        }
    }
}

/// Caller-supplied description of a layer to create
///
/// Only `type` and the kind's required field are mandatory (`src` for
/// images, `text` for text, `shapeType` for shapes); everything else falls
/// back to the defaults in [`crate::constants::defaults`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDraft {
    #[serde(rename = "type")]
    pub kind: LayerKind,
    #[serde(default)]
    pub id: Option<LayerId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub opacity: Option<f64>,
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub font_family: Option<String>,
    #[serde(default)]
    pub font_size: Option<f64>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub text_styles: Option<BTreeSet<TextStyle>>,
    #[serde(default)]
    pub shape_type: Option<ShapeType>,
    #[serde(default)]
    pub fill: Option<String>,
    #[serde(default)]
    pub stroke: Option<String>,
    #[serde(default)]
    pub stroke_width: Option<f64>,
    #[serde(default)]
    pub border_radius: Option<f64>,
}

impl LayerDraft {
    fn empty(kind: LayerKind) -> Self {
        Self {
            kind,
            id: None,
            name: None,
            x: None,
            y: None,
            width: None,
            height: None,
            opacity: None,
            src: None,
            text: None,
            font_family: None,
            font_size: None,
            color: None,
            text_styles: None,
            shape_type: None,
            fill: None,
            stroke: None,
            stroke_width: None,
            border_radius: None,
        }
    }

    pub fn image(src: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            src: Some(src.into()),
            name: Some(filename.into()),
            ..Self::empty(LayerKind::Image)
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::empty(LayerKind::Text)
        }
    }

    pub fn shape(shape_type: ShapeType) -> Self {
        Self {
            shape_type: Some(shape_type),
            ..Self::empty(LayerKind::Shape)
        }
    }

    pub fn with_id(mut self, id: impl Into<LayerId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    pub fn sized(mut self, width: f64, height: f64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn opacity(mut self, opacity: f64) -> Self {
        self.opacity = Some(opacity);
        self
    }

    pub fn font(mut self, family: impl Into<String>, size: f64) -> Self {
        self.font_family = Some(family.into());
        self.font_size = Some(size);
        self
    }

    pub fn font_size(mut self, size: f64) -> Self {
        self.font_size = Some(size);
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn styles(mut self, styles: impl IntoIterator<Item = TextStyle>) -> Self {
        self.text_styles = Some(styles.into_iter().collect());
        self
    }

    pub fn fill(mut self, fill: impl Into<String>) -> Self {
        self.fill = Some(fill.into());
        self
    }

    pub fn stroke(mut self, stroke: impl Into<String>, width: f64) -> Self {
        self.stroke = Some(stroke.into());
        self.stroke_width = Some(width);
        self
    }

    pub fn border_radius(mut self, radius: f64) -> Self {
        self.border_radius = Some(radius);
        self
    }

    /// Validate the draft against the per-kind rules and materialize it
    ///
    /// `id` is the identifier to use when the draft does not carry one.
    pub fn build(self, id: LayerId, locale: Locale) -> Result<Layer, LayerError> {
        let content = self.content()?;
        let (default_width, default_height) = default_size(&content);
        let geometry = Geometry::new(
            self.x.unwrap_or(defaults::SPAWN_X),
            self.y.unwrap_or(defaults::SPAWN_Y),
            self.width.unwrap_or(default_width),
            self.height.unwrap_or(default_height),
        );

        let mut layer = Layer {
            id: self.id.unwrap_or(id),
            name: self.name.unwrap_or_default(),
            geometry,
            opacity: self.opacity.unwrap_or(defaults::OPACITY),
            content,
        };
        if layer.name.is_empty() {
            layer.name = derive_display_name(&layer, locale);
        }
        layer.validate()?;
        Ok(layer)
    }

    fn content(&self) -> Result<LayerContent, LayerError> {
        let missing = |field| LayerError::MissingField { kind: self.kind, field };
        let content = match self.kind {
            LayerKind::Image => LayerContent::Image(ImageContent {
                src: self.src.clone().filter(|s| !s.is_empty()).ok_or_else(|| missing("src"))?,
            }),
            LayerKind::Text => {
                let text = self.text.clone().ok_or_else(|| missing("text"))?;
                if text.trim().is_empty() {
                    return Err(LayerError::EmptyText);
                }
                LayerContent::Text(TextContent {
                    text,
                    font_family: self
                        .font_family
                        .clone()
                        .unwrap_or_else(|| defaults::FONT_FAMILY.to_string()),
                    font_size: self.font_size.unwrap_or(defaults::FONT_SIZE),
                    color: self.color.clone().unwrap_or_else(|| defaults::TEXT_COLOR.to_string()),
                    text_styles: self.text_styles.clone().unwrap_or_default(),
                })
            }
            LayerKind::Shape => LayerContent::Shape(ShapeContent {
                shape_type: self.shape_type.ok_or_else(|| missing("shapeType"))?,
                fill: self.fill.clone().unwrap_or_else(|| defaults::SHAPE_FILL.to_string()),
                stroke: self.stroke.clone().unwrap_or_else(|| defaults::SHAPE_STROKE.to_string()),
                stroke_width: self.stroke_width.unwrap_or(0.0),
                border_radius: self.border_radius.unwrap_or(0.0),
            }),
        };
        Ok(content)
    }
}

fn default_size(content: &LayerContent) -> (f64, f64) {
    match content {
        LayerContent::Image(_) => (defaults::IMAGE_WIDTH, defaults::IMAGE_HEIGHT),
        LayerContent::Text(text) => {
            let chars = text.text.chars().count().max(1) as f64;
            (
                chars * text.font_size * defaults::TEXT_WIDTH_FACTOR,
                text.font_size * defaults::TEXT_HEIGHT_FACTOR,
            )
        }
        LayerContent::Shape(shape) => match shape.shape_type {
            ShapeType::Rect => (defaults::SHAPE_WIDTH, defaults::RECT_HEIGHT),
            ShapeType::Circle => (defaults::SHAPE_WIDTH, defaults::CIRCLE_HEIGHT),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_layer(text: &str) -> Layer {
        LayerDraft::text(text).build(LayerId::from("t1"), Locale::En).unwrap()
    }

    #[test]
    fn test_text_name_short() {
        let layer = text_layer("SCORE: 10");
        assert_eq!(layer.name, "Text: SCORE: 10");
    }

    #[test]
    fn test_text_name_truncates_by_chars() {
        let layer = text_layer("STARTING LINEUP");
        assert_eq!(layer.name, "Text: STARTING L...");

        // Multi-byte text is cut on character boundaries
        let layer = text_layer("상품에 대한 간단한 설명을 입력하세요.");
        assert_eq!(derive_display_name(&layer, Locale::Ko), "텍스트: 상품에 대한 간단한...");
    }

    #[test]
    fn test_shape_names_per_locale() {
        let rect = LayerDraft::shape(ShapeType::Rect)
            .build(LayerId::from("s1"), Locale::En)
            .unwrap();
        assert_eq!(rect.name, "Shape: Rectangle");
        assert_eq!(derive_display_name(&rect, Locale::Ko), "도형: 사각형");

        let circle = LayerDraft::shape(ShapeType::Circle)
            .build(LayerId::from("s2"), Locale::En)
            .unwrap();
        assert_eq!(circle.name, "Shape: Circle");
    }

    #[test]
    fn test_image_name_falls_back_to_src_filename() {
        let mut image = LayerDraft::image("file:///tmp/overlay/logo.png", "")
            .build(LayerId::from("i1"), Locale::En)
            .unwrap();
        assert_eq!(image.name, "logo.png");

        image.name = "team-crest.gif".to_string();
        assert_eq!(derive_display_name(&image, Locale::En), "team-crest.gif");
    }

    #[test]
    fn test_draft_defaults() {
        let layer = text_layer("HOME");
        assert_eq!(layer.id.as_str(), "t1");
        assert_eq!(layer.opacity, 1.0);
        assert_eq!(layer.geometry.x, 100.0);
        assert_eq!(layer.geometry.y, 100.0);
        assert_eq!(layer.geometry.width, 4.0 * 24.0 * 0.6);
        assert_eq!(layer.geometry.height, 36.0);

        let circle = LayerDraft::shape(ShapeType::Circle)
            .build(LayerId::from("c"), Locale::En)
            .unwrap();
        assert_eq!((circle.geometry.width, circle.geometry.height), (200.0, 200.0));
        match circle.content {
            LayerContent::Shape(shape) => {
                assert_eq!(shape.fill, "#3b82f6");
                assert_eq!(shape.stroke, "transparent");
            }
            other => panic!("expected shape, got {other:?}"),
        }
    }

    #[test]
    fn test_draft_keeps_supplied_id() {
        let layer = LayerDraft::text("A")
            .with_id("fixed")
            .build(LayerId::from("generated"), Locale::En)
            .unwrap();
        assert_eq!(layer.id.as_str(), "fixed");
    }

    #[test]
    fn test_draft_requires_kind_fields() {
        let mut draft = LayerDraft::shape(ShapeType::Rect);
        draft.shape_type = None;
        assert_eq!(
            draft.build(LayerId::generate(), Locale::En),
            Err(LayerError::MissingField { kind: LayerKind::Shape, field: "shapeType" })
        );

        let draft = LayerDraft::image("", "x.png");
        assert!(matches!(
            draft.build(LayerId::generate(), Locale::En),
            Err(LayerError::MissingField { field: "src", .. })
        ));

        assert_eq!(
            LayerDraft::text("   ").build(LayerId::generate(), Locale::En),
            Err(LayerError::EmptyText)
        );
    }

    #[test]
    fn test_draft_rejects_bad_values() {
        let draft = LayerDraft::text("A").sized(0.0, 10.0);
        assert!(matches!(
            draft.build(LayerId::generate(), Locale::En),
            Err(LayerError::InvalidGeometry { .. })
        ));

        let draft = LayerDraft::text("A").font_size(401.0);
        assert_eq!(
            draft.build(LayerId::generate(), Locale::En),
            Err(LayerError::FontSizeOutOfRange(401.0))
        );

        let draft = LayerDraft::shape(ShapeType::Rect).opacity(1.5);
        assert_eq!(
            draft.build(LayerId::generate(), Locale::En),
            Err(LayerError::OpacityOutOfRange(1.5))
        );
    }

    #[test]
    fn test_patch_rederives_text_name() {
        let layer = text_layer("SCORE");
        let patched = layer.patched(&LayerPatch::text("SCORE: 10"), Locale::En).unwrap();
        assert_eq!(patched.name, "Text: SCORE: 10");
        // Original untouched
        assert_eq!(layer.name, "Text: SCORE");
    }

    #[test]
    fn test_patch_rederives_shape_name() {
        let layer = LayerDraft::shape(ShapeType::Rect)
            .named("Background")
            .build(LayerId::generate(), Locale::En)
            .unwrap();
        assert_eq!(layer.name, "Background");

        let fill_only = LayerPatch { fill: Some("#fff".into()), ..LayerPatch::default() };
        assert_eq!(layer.patched(&fill_only, Locale::En).unwrap().name, "Background");

        let to_circle = LayerPatch { shape_type: Some(ShapeType::Circle), ..LayerPatch::default() };
        assert_eq!(layer.patched(&to_circle, Locale::En).unwrap().name, "Shape: Circle");
    }

    #[test]
    fn test_patch_rejects_foreign_fields() {
        let layer = text_layer("A");
        let patch = LayerPatch { fill: Some("red".into()), ..LayerPatch::default() };
        assert_eq!(
            layer.patched(&patch, Locale::En),
            Err(LayerError::FieldNotApplicable { field: "fill", kind: LayerKind::Text })
        );

        let image = LayerDraft::image("a.png", "a.png")
            .build(LayerId::generate(), Locale::En)
            .unwrap();
        assert!(image.patched(&LayerPatch::text("x"), Locale::En).is_err());
    }

    #[test]
    fn test_patch_rejects_zero_width() {
        let layer = text_layer("A");
        let patch = LayerPatch { width: Some(0.0), ..LayerPatch::default() };
        assert!(matches!(
            layer.patched(&patch, Locale::En),
            Err(LayerError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn test_json_shape_matches_wire_format() {
        let layer = LayerDraft::text("HOME")
            .with_id("resource-7")
            .styles([TextStyle::Bold])
            .build(LayerId::generate(), Locale::En)
            .unwrap();
        let value = serde_json::to_value(&layer).unwrap();
        assert_eq!(value["type"], "text");
        assert_eq!(value["id"], "resource-7");
        assert_eq!(value["fontFamily"], "Pretendard");
        assert_eq!(value["textStyles"], serde_json::json!(["bold"]));
        assert_eq!(value["x"], 100.0);
    }

    #[test]
    fn test_missing_opacity_defaults_to_one() {
        let json = r##"{"id":"resource-1","type":"shape","name":"bg","x":0,"y":0,"width":10,"height":10,
            "shapeType":"rect","fill":"#fff","stroke":"transparent","strokeWidth":0,"borderRadius":0}"##;
        let layer: Layer = serde_json::from_str(json).unwrap();
        assert_eq!(layer.opacity, 1.0);
        assert_eq!(layer.geometry, Geometry::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let ids: std::collections::HashSet<_> = (0..500).map(|_| LayerId::generate()).collect();
        assert_eq!(ids.len(), 500);
    }
}
