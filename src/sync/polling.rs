//! Polling strategy: the persisted snapshot is the source of truth
//!
//! A subscriber reads immediately on registration. After that, one worker
//! thread re-reads whenever the snapshot file changes and on a fixed interval
//! as a backstop. A snapshot equal to the last one delivered is not delivered
//! again.

use anyhow::Result;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

use super::{Strategy, SyncChannel, UpdateCallback};
use crate::layer::Snapshot;
use crate::persistence::SnapshotStore;

enum Signal {
    Changed,
    Stop,
}

#[derive(Default)]
struct DeliveryState {
    callback: Option<UpdateCallback>,
    last: Option<Snapshot>,
}

/// Read the store and hand a changed snapshot to the callback
///
/// The lock is held across read and delivery so deliveries never reorder.
fn refresh(state: &Mutex<DeliveryState>, store: &dyn SnapshotStore, force: bool) {
    let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
    let snapshot = match store.read() {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => return,
        Err(e) => {
            debug!(error = %format!("{e:#}"), "Poll read failed");
            return;
        }
    };
    if !force && state.last.as_ref() == Some(&snapshot) {
        return;
    }
    state.last = Some(snapshot.clone());
    if let Some(callback) = state.callback.as_mut() {
        debug!(layers = snapshot.len(), "Delivering polled snapshot");
        callback(snapshot);
    }
}

struct Worker {
    signal: Sender<Signal>,
    handle: JoinHandle<()>,
    _watcher: Option<RecommendedWatcher>,
}

pub struct PollingChannel {
    store: Arc<dyn SnapshotStore>,
    interval: Duration,
    state: Arc<Mutex<DeliveryState>>,
    worker: Option<Worker>,
    closed: bool,
}

impl PollingChannel {
    pub fn new(store: Arc<dyn SnapshotStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            state: Arc::new(Mutex::new(DeliveryState::default())),
            worker: None,
            closed: false,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn start_worker(&self) -> Worker {
        let (signal, receiver) = mpsc::channel();

        let watcher = self
            .store
            .watch_path()
            .and_then(|path| watch_snapshot_file(path, signal.clone()));

        let store = self.store.clone();
        let state = self.state.clone();
        let interval = self.interval;
        let handle = std::thread::spawn(move || {
            loop {
                match receiver.recv_timeout(interval) {
                    Ok(Signal::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                    Ok(Signal::Changed) | Err(RecvTimeoutError::Timeout) => {
                        refresh(&state, store.as_ref(), false);
                    }
                }
            }
            debug!("Polling worker stopped");
        });

        Worker {
            signal,
            handle,
            _watcher: watcher,
        }
    }
}

/// Watch the snapshot's directory and signal on changes to the snapshot file
///
/// Returns `None` when no watcher can be installed; the interval still runs.
fn watch_snapshot_file(path: &Path, signal: Sender<Signal>) -> Option<RecommendedWatcher> {
    let dir = path.parent()?.to_path_buf();
    let file_name = path.file_name()?.to_os_string();

    if let Err(e) = std::fs::create_dir_all(&dir) {
        warn!(dir = %dir.display(), error = %e, "Cannot create snapshot directory to watch");
        return None;
    }

    let watcher = notify::recommended_watcher(move |result: Result<Event, notify::Error>| {
        let Ok(event) = result else {
            return;
        };
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            return;
        }
        if event.paths.iter().any(|p| p.file_name() == Some(file_name.as_os_str())) {
            let _ = signal.send(Signal::Changed);
        }
    });

    let mut watcher = match watcher {
        Ok(watcher) => watcher,
        Err(e) => {
            warn!(error = %e, "Failed to create snapshot watcher, relying on polling");
            return None;
        }
    };
    if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
        warn!(dir = %dir.display(), error = %e, "Failed to watch snapshot directory, relying on polling");
        return None;
    }

    debug!(dir = %dir.display(), "Watching snapshot directory");
    Some(watcher)
}

impl SyncChannel for PollingChannel {
    fn strategy(&self) -> Strategy {
        Strategy::Polling
    }

    fn post_update(&self, snapshot: &Snapshot) {
        // The publisher's save already went through the store
        debug!(layers = snapshot.len(), "post_update is a no-op under polling");
    }

    fn on_update(&mut self, callback: UpdateCallback) -> Result<()> {
        if self.closed {
            anyhow::bail!("Sync channel is closed");
        }

        self.state.lock().unwrap_or_else(PoisonError::into_inner).callback = Some(callback);
        refresh(&self.state, self.store.as_ref(), true);

        if self.worker.is_none() {
            self.worker = Some(self.start_worker());
        }
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
        let Some(worker) = self.worker.take() else {
            return;
        };

        // Watcher goes first so it cannot signal a stopped worker
        drop(worker._watcher);
        let _ = worker.signal.send(Signal::Stop);
        if worker.handle.join().is_err() {
            warn!("Polling worker panicked");
        }
        self.state.lock().unwrap_or_else(PoisonError::into_inner).callback = None;
        debug!("Closed polling channel");
    }
}

impl Drop for PollingChannel {
    fn drop(&mut self) {
        self.close();
    }
}
