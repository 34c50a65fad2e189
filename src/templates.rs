//! Built-in layer sets: the seed sample and the overlay templates

use crate::layer::{Layer, LayerDraft, LayerId, Locale, ShapeType, Snapshot, TextStyle};

const BOLD: [TextStyle; 1] = [TextStyle::Bold];
const FONT: &str = "Pretendard";

/// A named, ready-made layout that replaces the whole canvas when loaded
#[derive(Debug, Clone)]
pub struct Template {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub layers: Vec<LayerDraft>,
}

/// Layers seeded into a store when nothing has been persisted yet
pub fn sample_snapshot() -> Snapshot {
    let sample = LayerDraft::image(
        "https://www.transparentpng.com/thumb/dog/transparent-picture-dog-4.png",
        "Sample image 1",
    )
    .with_id("resource-1")
    .at(100.0, 100.0)
    .sized(200.0, 150.0)
    .build(LayerId::from("resource-1"), Locale::En);

    // The sample is a static literal; if it ever fails validation the store
    // simply starts empty.
    sample.into_iter().collect::<Vec<Layer>>()
}

pub fn all() -> Vec<Template> {
    vec![scoreboard(), lineup(), lower_third(), product_card()]
}

pub fn find(id: &str) -> Option<Template> {
    all().into_iter().find(|t| t.id == id)
}

fn panel(name: &str, x: f64, y: f64, width: f64, height: f64, fill: &str) -> LayerDraft {
    LayerDraft::shape(ShapeType::Rect)
        .named(name)
        .at(x, y)
        .sized(width, height)
        .fill(fill)
        .stroke("transparent", 0.0)
}

#[allow(clippy::too_many_arguments)]
fn label(name: &str, text: &str, x: f64, y: f64, width: f64, height: f64, size: f64, color: &str) -> LayerDraft {
    LayerDraft::text(text)
        .named(name)
        .at(x, y)
        .sized(width, height)
        .font(FONT, size)
        .color(color)
        .opacity(1.0)
}

fn scoreboard() -> Template {
    Template {
        id: "scoreboard",
        name: "Scoreboard",
        description: "Basic scoreboard with team names, scores and a backdrop",
        layers: vec![
            panel("Backdrop", 300.0, 20.0, 680.0, 80.0, "rgba(0,0,0,0.75)")
                .border_radius(8.0)
                .opacity(0.9),
            panel("Divider", 630.0, 30.0, 4.0, 60.0, "#ffffff")
                .border_radius(2.0)
                .opacity(0.6),
            label("Home team", "HOME", 320.0, 35.0, 200.0, 50.0, 28.0, "#ffffff").styles(BOLD),
            label("Away team", "AWAY", 660.0, 35.0, 200.0, 50.0, 28.0, "#ffffff").styles(BOLD),
            label("Home score", "0", 570.0, 30.0, 50.0, 50.0, 36.0, "#facc15").styles(BOLD),
            label("Away score", "0", 645.0, 30.0, 50.0, 50.0, 36.0, "#facc15").styles(BOLD),
        ],
    }
}

fn lineup() -> Template {
    let mut layers = vec![
        panel("Backdrop", 40.0, 100.0, 260.0, 400.0, "rgba(0,0,0,0.7)")
            .stroke("#3b82f6", 2.0)
            .border_radius(12.0)
            .opacity(0.9),
        label("Title", "STARTING LINEUP", 60.0, 115.0, 220.0, 40.0, 22.0, "#3b82f6").styles(BOLD),
    ];
    for n in 1..=5 {
        let y = 170.0 + 45.0 * (n - 1) as f64;
        layers.push(label(
            &format!("Player {n}"),
            &format!("{n}. Player Name"),
            60.0,
            y,
            220.0,
            36.0,
            18.0,
            "#ffffff",
        ));
    }
    Template {
        id: "lineup",
        name: "Lineup",
        description: "Vertical list for a team lineup",
        layers,
    }
}

fn lower_third() -> Template {
    Template {
        id: "lower-third",
        name: "Lower third",
        description: "Caption bar showing a name and a role",
        layers: vec![
            panel("Backdrop", 60.0, 560.0, 400.0, 90.0, "rgba(0,0,0,0.8)")
                .border_radius(4.0)
                .opacity(0.95),
            panel("Accent bar", 60.0, 560.0, 5.0, 90.0, "#3b82f6").opacity(1.0),
            label("Name", "Jane Doe", 80.0, 570.0, 360.0, 40.0, 28.0, "#ffffff").styles(BOLD),
            label("Role", "Commentator", 80.0, 610.0, 360.0, 30.0, 18.0, "#9ca3af"),
        ],
    }
}

fn product_card() -> Template {
    Template {
        id: "product-card",
        name: "Product card",
        description: "Card layout for product information",
        layers: vec![
            panel("Card backdrop", 800.0, 300.0, 300.0, 200.0, "rgba(30,30,30,0.9)")
                .stroke("#6b7280", 1.0)
                .border_radius(12.0)
                .opacity(0.95),
            label("Product name", "Product name", 820.0, 320.0, 260.0, 36.0, 24.0, "#ffffff").styles(BOLD),
            label("Price", "₩29,900", 820.0, 365.0, 260.0, 32.0, 22.0, "#facc15").styles(BOLD),
            label(
                "Description",
                "Enter a short description of the product.",
                820.0,
                410.0,
                260.0,
                60.0,
                14.0,
                "#9ca3af",
            )
            .opacity(0.9),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_snapshot() {
        let sample = sample_snapshot();
        assert_eq!(sample.len(), 1);
        assert_eq!(sample[0].id.as_str(), "resource-1");
        assert!(sample[0].is_image());
        assert_eq!(sample[0].geometry.height, 150.0);
    }

    #[test]
    fn test_every_template_builds() {
        for template in all() {
            assert!(!template.layers.is_empty(), "{} has no layers", template.id);
            for draft in template.layers {
                draft
                    .build(LayerId::generate(), Locale::En)
                    .unwrap_or_else(|e| panic!("{}: {e}", template.id));
            }
        }
    }

    #[test]
    fn test_find_template() {
        assert_eq!(find("lineup").map(|t| t.layers.len()), Some(7));
        assert!(find("missing").is_none());
    }
}
