//! Passive viewer surfaces
//!
//! A viewer reads the persisted snapshot once when mounted, then follows the
//! sync channel. It never writes anything back.

use anyhow::Result;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::layer::Snapshot;
use crate::persistence::SnapshotStore;
use crate::render::{render, Frame};
use crate::sync::{Strategy, SyncChannel};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Surface {
    /// Transparent page for browser-source capture
    Overlay,
    /// Layers over an embedded background page
    Preview { background: String },
}

impl Surface {
    pub fn background(&self) -> Option<&str> {
        match self {
            Surface::Overlay => None,
            Surface::Preview { background } => Some(background),
        }
    }
}

pub struct Viewer {
    surface: Surface,
    latest: Arc<Mutex<Snapshot>>,
    channel: Box<dyn SyncChannel>,
}

impl Viewer {
    /// Mount on `channel`
    ///
    /// The returned receiver yields a frame for the initial read and one per
    /// observed update.
    pub fn mount(
        surface: Surface,
        persistence: &dyn SnapshotStore,
        mut channel: Box<dyn SyncChannel>,
    ) -> Result<(Self, Receiver<Frame>)> {
        let persisted = match persistence.read() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Viewer could not read persisted layers");
                None
            }
        };

        // A polling channel delivers the persisted snapshot when registered
        let delivered_on_register = persisted.is_some() && channel.strategy() == Strategy::Polling;
        let initial = persisted.unwrap_or_default();

        let (frames, receiver) = mpsc::channel();
        if !delivered_on_register {
            let _ = frames.send(render(&initial));
        }
        let latest = Arc::new(Mutex::new(initial));

        let shared = latest.clone();
        channel.on_update(Box::new(move |snapshot: Snapshot| {
            debug!(layers = snapshot.len(), "Viewer received update");
            let frame = render(&snapshot);
            *shared.lock().unwrap_or_else(PoisonError::into_inner) = snapshot;
            let _ = frames.send(frame);
        }))?;

        info!(surface = ?surface, strategy = ?channel.strategy(), "Viewer mounted");
        Ok((
            Self {
                surface,
                latest,
                channel,
            },
            receiver,
        ))
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn snapshot(&self) -> Snapshot {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn frame(&self) -> Frame {
        render(&self.latest.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Current frame as a standalone page for this surface
    pub fn html(&self) -> String {
        self.frame().to_html(self.surface.background())
    }

    pub fn close(&mut self) {
        self.channel.close();
    }
}
