//! Line-driven editing session
//!
//! One store stays open for the whole session, so geometry resets, selection
//! and keyboard input act on every change made since it started. Each input
//! line is one command; double quotes keep text with spaces together.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::layer::{Geometry, Layer, LayerDraft, LayerId, LayerPatch, ShapeType, TextStyle};
use crate::selection::{self, InputSender, InputSubscription, Key, KeyInput};
use crate::store::ResourceStore;
use crate::upload;

/// Commands that change the layers of a store
#[derive(Debug, Subcommand)]
pub enum EditCommand {
    /// Add a text layer
    AddText {
        text: String,
        #[arg(long)]
        font_size: Option<f64>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        bold: bool,
        #[arg(long)]
        italic: bool,
    },
    /// Add a rectangle or circle
    AddShape {
        shape: ShapeArg,
        #[arg(long)]
        fill: Option<String>,
    },
    /// Upload a PNG or GIF and add it as an image layer
    AddImage { path: PathBuf },
    /// Set a layer's position, and optionally its size
    #[command(allow_negative_numbers = true)]
    Move {
        id: String,
        x: f64,
        y: f64,
        #[arg(long)]
        width: Option<f64>,
        #[arg(long)]
        height: Option<f64>,
    },
    /// Move several layers by the same offset
    #[command(allow_negative_numbers = true)]
    Nudge {
        dx: f64,
        dy: f64,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Replace the text of a text layer
    Update { id: String, text: String },
    /// Remove layers
    Remove {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Replace the canvas with a built-in template
    Template { name: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ShapeArg {
    Rect,
    Circle,
}

impl From<ShapeArg> for ShapeType {
    fn from(value: ShapeArg) -> Self {
        match value {
            ShapeArg::Rect => ShapeType::Rect,
            ShapeArg::Circle => ShapeType::Circle,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ResetTarget {
    Previous,
    Initial,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KeyArg {
    Up,
    Down,
    Left,
    Right,
    Delete,
}

impl From<KeyArg> for Key {
    fn from(value: KeyArg) -> Self {
        match value {
            KeyArg::Up => Key::ArrowUp,
            KeyArg::Down => Key::ArrowDown,
            KeyArg::Left => Key::ArrowLeft,
            KeyArg::Right => Key::ArrowRight,
            KeyArg::Delete => Key::Delete,
        }
    }
}

#[derive(Debug, Subcommand)]
enum SessionOp {
    #[command(flatten)]
    Edit(EditCommand),
    /// Restore layer geometry
    Reset { target: ResetTarget },
    /// Click a layer
    Select {
        id: String,
        /// Toggle membership instead of replacing the selection
        #[arg(long)]
        add: bool,
    },
    /// Click empty canvas
    Clear,
    /// Press a key on the canvas
    Press {
        key: KeyArg,
        #[arg(long)]
        shift: bool,
    },
    /// Finish dragging a layer at a new position
    #[command(allow_negative_numbers = true)]
    Drag {
        id: String,
        x: f64,
        y: f64,
        #[arg(long)]
        width: Option<f64>,
        #[arg(long)]
        height: Option<f64>,
    },
    /// Print the layers of the session
    List,
    /// Persist and publish the current layers
    Save,
}

#[derive(Debug, Parser)]
#[command(no_binary_name = true)]
struct SessionLine {
    #[command(subcommand)]
    op: SessionOp,
}

/// Apply one editing command; returns the id of a created layer
pub fn apply(store: &mut ResourceStore, command: EditCommand, images_dir: &Path) -> Result<Option<LayerId>> {
    match command {
        EditCommand::AddText {
            text,
            font_size,
            color,
            bold,
            italic,
        } => {
            let mut draft = LayerDraft::text(text);
            if let Some(size) = font_size {
                draft = draft.font_size(size);
            }
            if let Some(color) = color {
                draft = draft.color(color);
            }
            let styles = [(bold, TextStyle::Bold), (italic, TextStyle::Italic)];
            draft = draft.styles(styles.into_iter().filter(|(on, _)| *on).map(|(_, s)| s));
            Ok(Some(store.add_layer(draft)?.id))
        }
        EditCommand::AddShape { shape, fill } => {
            let mut draft = LayerDraft::shape(shape.into());
            if let Some(fill) = fill {
                draft = draft.fill(fill);
            }
            Ok(Some(store.add_layer(draft)?.id))
        }
        EditCommand::AddImage { path } => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            let layer = runtime.block_on(upload::add_image_layer(store, &path, images_dir))?;
            Ok(Some(layer.id))
        }
        EditCommand::Move {
            id,
            x,
            y,
            width,
            height,
        } => {
            let id = LayerId::from(id);
            let geometry = target_geometry(store, &id, x, y, width, height)?;
            store.move_or_resize(&id, geometry)?;
            Ok(None)
        }
        EditCommand::Nudge { dx, dy, ids } => {
            let ids: Vec<LayerId> = ids.into_iter().map(LayerId::from).collect();
            let moved = store.move_by_delta(&ids, dx, dy);
            info!(count = moved, "Nudged layers");
            Ok(None)
        }
        EditCommand::Update { id, text } => {
            store.update_layer(&LayerId::from(id), &LayerPatch::text(text))?;
            Ok(None)
        }
        EditCommand::Remove { ids } => {
            let ids: Vec<LayerId> = ids.into_iter().map(LayerId::from).collect();
            let removed = store.remove_layers(&ids);
            info!(count = removed, "Removed layers");
            Ok(None)
        }
        EditCommand::Template { name } => {
            store.load_builtin_template(&name)?;
            Ok(None)
        }
    }
}

/// New geometry for `id`, keeping the current size where none is given
fn target_geometry(
    store: &ResourceStore,
    id: &LayerId,
    x: f64,
    y: f64,
    width: Option<f64>,
    height: Option<f64>,
) -> Result<Geometry> {
    let current = store
        .get(id)
        .map(|l| l.geometry)
        .with_context(|| format!("No layer with id {id}"))?;
    Ok(Geometry::new(x, y, width.unwrap_or(current.width), height.unwrap_or(current.height)))
}

/// Save the store, turning a refused save into an error
pub fn save(store: &mut ResourceStore) -> Result<()> {
    if !store.save() {
        let reason = store.last_error().unwrap_or("unknown error").to_string();
        anyhow::bail!("Changes were not saved: {reason}");
    }
    Ok(())
}

pub fn format_layer(layer: &Layer) -> String {
    let g = &layer.geometry;
    format!(
        "{:<40} {:<6} {:<24} {},{} {}x{} opacity={}",
        layer.id.as_str(),
        layer.kind().to_string(),
        layer.name,
        g.x,
        g.y,
        g.width,
        g.height,
        layer.opacity
    )
}

/// Split a line into words, keeping double-quoted text together
fn split_args(line: &str) -> Result<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    args.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quoted {
        anyhow::bail!("Unterminated quote");
    }
    if in_word {
        args.push(current);
    }
    Ok(args)
}

/// An editor that owns one store until it is finished
pub struct EditSession {
    store: ResourceStore,
    images_dir: PathBuf,
    keys: InputSender,
    input: InputSubscription,
}

impl EditSession {
    pub fn new(store: ResourceStore, images_dir: PathBuf) -> Self {
        let (keys, input) = selection::subscribe();
        Self {
            store,
            images_dir,
            keys,
            input,
        }
    }

    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    /// Run one command line; returns text to show the user, if any
    pub fn execute(&mut self, line: &str) -> Result<Option<String>> {
        let args = split_args(line)?;
        if args.is_empty() {
            return Ok(None);
        }
        let line = SessionLine::try_parse_from(args)?;

        match line.op {
            SessionOp::Edit(command) => {
                let created = apply(&mut self.store, command, &self.images_dir)?;
                Ok(created.map(|id| id.to_string()))
            }
            SessionOp::Reset { target } => {
                match target {
                    ResetTarget::Previous => self.store.reset_to_previous(),
                    ResetTarget::Initial => self.store.reset_to_initial(),
                }
                Ok(None)
            }
            SessionOp::Select { id, add } => {
                let id = LayerId::from(id);
                if !self.store.select(&id, add) {
                    anyhow::bail!("No layer with id {id}");
                }
                Ok(None)
            }
            SessionOp::Clear => {
                self.store.clear_selection();
                Ok(None)
            }
            SessionOp::Press { key, shift } => {
                let mut input = KeyInput::new(key.into());
                if shift {
                    input = input.with_modifier();
                }
                if !self.keys.send(input) {
                    anyhow::bail!("Keyboard input is closed");
                }
                let handled = self.input.pump(&mut self.store);
                debug!(handled, "Applied key press");
                Ok(None)
            }
            SessionOp::Drag {
                id,
                x,
                y,
                width,
                height,
            } => {
                let id = LayerId::from(id);
                let geometry = target_geometry(&self.store, &id, x, y, width, height)?;
                self.store.drag_stop(&id, geometry)?;
                Ok(None)
            }
            SessionOp::List => {
                let lines: Vec<String> = self.store.layers().iter().map(format_layer).collect();
                Ok(Some(lines.join("\n")).filter(|text| !text.is_empty()))
            }
            SessionOp::Save => {
                save(&mut self.store)?;
                Ok(Some("saved".to_string()))
            }
        }
    }

    /// Read commands until EOF, then save anything unsaved and close
    ///
    /// A failing command is reported on `output` and the session goes on.
    pub fn run<R: BufRead, W: Write>(mut self, input: R, output: &mut W) -> Result<()> {
        for line in input.lines() {
            let line = line.context("Failed to read session input")?;
            match self.execute(&line) {
                Ok(Some(text)) => writeln!(output, "{text}")?,
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %format!("{e:#}"), "Session command failed");
                    writeln!(output, "error: {e:#}")?;
                }
            }
            output.flush()?;
        }

        if self.store.is_modified() {
            save(&mut self.store)?;
        }
        self.store.close();
        info!("Editing session finished");
        Ok(())
    }
}
