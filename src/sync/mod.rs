//! Cross-surface sync channel
//!
//! Carries the latest saved snapshot from the editor to any number of passive
//! viewers. Two strategies exist:
//! - broadcast: every subscriber listens on its own Unix socket inside a
//!   per-channel directory, and the publisher fans each update out to all of
//!   them (unix only)
//! - polling: subscribers re-read the persisted snapshot on registration, on
//!   file change notifications and on a fixed interval; publishing is a no-op
//!
//! A process-local bus is also available for same-process surfaces.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::layer::Snapshot;
use crate::persistence::{Scope, SnapshotStore};

#[cfg(unix)]
pub mod broadcast;
pub mod local;
pub mod messages;
pub mod polling;

#[cfg(unix)]
pub use broadcast::BroadcastChannel;
pub use local::{LocalBus, LocalChannel};
pub use messages::SyncMessage;
pub use polling::PollingChannel;

/// Handler invoked with every snapshot a channel observes
pub type UpdateCallback = Box<dyn FnMut(Snapshot) + Send>;

/// Transport actually backing a channel instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Broadcast,
    Polling,
    Local,
}

/// Configured preference for the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Broadcast when the platform supports it, polling otherwise
    #[default]
    Auto,
    Broadcast,
    Polling,
}

pub trait SyncChannel: Send {
    fn strategy(&self) -> Strategy;

    /// Fire-and-forget publish of a saved snapshot
    ///
    /// Delivery failures are never reported; viewers reconcile through the
    /// persisted snapshot.
    fn post_update(&self, snapshot: &Snapshot);

    /// Register the update handler, replacing any previous one
    fn on_update(&mut self, callback: UpdateCallback) -> Result<()>;

    /// Release sockets, threads and watchers. Safe to call more than once.
    fn close(&mut self);
}

/// Open the channel for `scope`, falling back to polling when the broadcast
/// transport cannot be set up
pub fn open_channel(
    mode: SyncMode,
    runtime_dir: Option<&Path>,
    scope: &Scope,
    store: Arc<dyn SnapshotStore>,
    poll_interval: Duration,
) -> Box<dyn SyncChannel> {
    if mode != SyncMode::Polling {
        match open_broadcast(runtime_dir, scope) {
            Ok(channel) => {
                info!(channel = %scope.channel_name(), "Using broadcast sync channel");
                return channel;
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), mode = ?mode, "Broadcast sync unavailable, falling back to polling");
            }
        }
    }

    info!(
        channel = %scope.channel_name(),
        interval_ms = poll_interval.as_millis() as u64,
        "Using polling sync channel"
    );
    Box::new(PollingChannel::new(store, poll_interval))
}

#[cfg(unix)]
fn open_broadcast(runtime_dir: Option<&Path>, scope: &Scope) -> Result<Box<dyn SyncChannel>> {
    let runtime_dir = runtime_dir.ok_or_else(|| anyhow::anyhow!("No runtime directory for sync sockets"))?;
    let channel = BroadcastChannel::open(runtime_dir, &scope.channel_name())?;
    Ok(Box::new(channel))
}

#[cfg(not(unix))]
fn open_broadcast(_runtime_dir: Option<&Path>, _scope: &Scope) -> Result<Box<dyn SyncChannel>> {
    anyhow::bail!("Broadcast sync requires Unix domain sockets")
}
