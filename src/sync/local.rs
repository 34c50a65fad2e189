//! In-process bus for surfaces living in the same process

use anyhow::Result;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;
use uuid::Uuid;

use super::{Strategy, SyncChannel, UpdateCallback};
use crate::layer::Snapshot;

type Slot = Arc<Mutex<Option<UpdateCallback>>>;

/// Shared registry of every channel handed out by [`LocalBus::channel`]
#[derive(Clone, Default)]
pub struct LocalBus {
    slots: Arc<Mutex<Vec<(Uuid, Slot)>>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel(&self) -> LocalChannel {
        let id = Uuid::new_v4();
        let slot: Slot = Arc::new(Mutex::new(None));
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, slot.clone()));
        LocalChannel {
            id,
            slot,
            bus: self.clone(),
            closed: false,
        }
    }

    /// Number of channels that have not been closed
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct LocalChannel {
    id: Uuid,
    slot: Slot,
    bus: LocalBus,
    closed: bool,
}

impl SyncChannel for LocalChannel {
    fn strategy(&self) -> Strategy {
        Strategy::Local
    }

    fn post_update(&self, snapshot: &Snapshot) {
        if self.closed {
            return;
        }

        // Callbacks run after the registry lock is released
        let peers: Vec<Slot> = self
            .bus
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(id, _)| *id != self.id)
            .map(|(_, slot)| slot.clone())
            .collect();

        for peer in peers {
            if let Some(callback) = peer.lock().unwrap_or_else(PoisonError::into_inner).as_mut() {
                callback(snapshot.clone());
            }
        }
        debug!(layers = snapshot.len(), "Published snapshot on local bus");
    }

    fn on_update(&mut self, callback: UpdateCallback) -> Result<()> {
        if self.closed {
            anyhow::bail!("Sync channel is closed");
        }
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(callback);
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.bus
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(id, _)| *id != self.id);
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Drop for LocalChannel {
    fn drop(&mut self) {
        self.close();
    }
}
