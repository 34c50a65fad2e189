//! Broadcast strategy over Unix domain sockets
//!
//! Layout: `<runtime_dir>/<channel>/<subscriber-uuid>.sock`. A subscriber
//! binds its socket when it registers a handler. Publishing connects to every
//! socket in the directory and writes one length-prefixed update frame.
//! Connections are handled one at a time by the subscriber, so frames from a
//! single publisher arrive in publish order.

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::messages::{decode_update, read_frame, write_frame, SyncMessage};
use super::{Strategy, SyncChannel, UpdateCallback};
use crate::constants::sync::{READ_TIMEOUT_MS, SOCKET_EXTENSION, WRITE_TIMEOUT_MS};
use crate::layer::Snapshot;

type CallbackSlot = Arc<Mutex<Option<UpdateCallback>>>;

/// Subscriber socket plus the thread accepting on it
struct Endpoint {
    socket_path: PathBuf,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

pub struct BroadcastChannel {
    dir: PathBuf,
    callback: CallbackSlot,
    endpoint: Option<Endpoint>,
    closed: bool,
}

impl BroadcastChannel {
    /// Join the named channel under `runtime_dir`, creating its directory
    pub fn open(runtime_dir: &Path, channel_name: &str) -> Result<Self> {
        let dir = runtime_dir.join(channel_name);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create sync directory: {}", dir.display()))?;

        // Owner only
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))
                .with_context(|| format!("Failed to set permissions on {}", dir.display()))?;
        }

        debug!(dir = %dir.display(), "Opened broadcast channel");
        Ok(Self {
            dir,
            callback: Arc::new(Mutex::new(None)),
            endpoint: None,
            closed: false,
        })
    }

    /// Socket this instance listens on, once subscribed
    pub fn socket_path(&self) -> Option<&Path> {
        self.endpoint.as_ref().map(|e| e.socket_path.as_path())
    }

    fn subscriber_sockets(&self) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.dir.display(), error = %e, "Cannot list subscribers");
                return Vec::new();
            }
        };
        let own = self.socket_path();
        entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == SOCKET_EXTENSION))
            .filter(|path| Some(path.as_path()) != own)
            .collect()
    }

    fn bind(&self) -> Result<Endpoint> {
        let socket_path = self
            .dir
            .join(format!("{}.{}", Uuid::new_v4().simple(), SOCKET_EXTENSION));
        let listener = UnixListener::bind(&socket_path)
            .with_context(|| format!("Failed to bind socket at {}", socket_path.display()))?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = spawn_subscriber(listener, socket_path.clone(), shutdown.clone(), self.callback.clone());

        Ok(Endpoint {
            socket_path,
            shutdown,
            handle: Some(handle),
        })
    }
}

fn spawn_subscriber(
    listener: UnixListener,
    socket_path: PathBuf,
    shutdown: Arc<AtomicBool>,
    callback: CallbackSlot,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        if let Err(e) = run_subscriber_loop(&listener, &socket_path, &shutdown, &callback) {
            error!(error = ?e, "Sync subscriber thread crashed");
        }
    })
}

fn run_subscriber_loop(
    listener: &UnixListener,
    socket_path: &Path,
    shutdown: &AtomicBool,
    callback: &CallbackSlot,
) -> Result<()> {
    info!(socket = %socket_path.display(), "Sync subscriber listening");

    for stream in listener.incoming() {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        let mut stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "Failed to accept sync connection");
                continue;
            }
        };

        if let Err(e) = stream.set_read_timeout(Some(Duration::from_millis(READ_TIMEOUT_MS))) {
            debug!(error = %e, "Failed to set read timeout");
            continue;
        }

        let payload = match read_frame(&mut stream) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(error = %format!("{e:#}"), "Dropped incomplete sync frame");
                continue;
            }
        };

        if let Some(snapshot) = decode_update(&payload) {
            debug!(layers = snapshot.len(), "Received snapshot");
            let mut slot = callback.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(callback) = slot.as_mut() {
                callback(snapshot);
            }
        }
    }

    debug!(socket = %socket_path.display(), "Sync subscriber stopped");
    Ok(())
}

impl SyncChannel for BroadcastChannel {
    fn strategy(&self) -> Strategy {
        Strategy::Broadcast
    }

    fn post_update(&self, snapshot: &Snapshot) {
        if self.closed {
            debug!("post_update on closed channel ignored");
            return;
        }

        let payload = match serde_json::to_vec(&SyncMessage::update(snapshot)) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to encode sync update");
                return;
            }
        };

        let mut delivered = 0usize;
        for path in self.subscriber_sockets() {
            match UnixStream::connect(&path) {
                Ok(mut stream) => {
                    let sent = stream
                        .set_write_timeout(Some(Duration::from_millis(WRITE_TIMEOUT_MS)))
                        .context("Failed to set write timeout")
                        .and_then(|_| write_frame(&mut stream, &payload));
                    match sent {
                        Ok(()) => delivered += 1,
                        Err(e) => debug!(socket = %path.display(), error = %format!("{e:#}"), "Sync delivery failed"),
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::ConnectionRefused | ErrorKind::NotFound) => {
                    // Owner exited without cleaning up
                    debug!(socket = %path.display(), "Removing stale subscriber socket");
                    let _ = std::fs::remove_file(&path);
                }
                Err(e) => debug!(socket = %path.display(), error = %e, "Cannot reach subscriber"),
            }
        }

        debug!(layers = snapshot.len(), subscribers = delivered, "Published snapshot");
    }

    fn on_update(&mut self, callback: UpdateCallback) -> Result<()> {
        if self.closed {
            anyhow::bail!("Sync channel is closed");
        }

        *self.callback.lock().unwrap_or_else(PoisonError::into_inner) = Some(callback);
        if self.endpoint.is_none() {
            self.endpoint = Some(self.bind()?);
        }
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
        let Some(mut endpoint) = self.endpoint.take() else {
            return;
        };

        endpoint.shutdown.store(true, Ordering::SeqCst);
        // Unblock accept() so the thread sees the flag
        let woke = UnixStream::connect(&endpoint.socket_path).is_ok();
        if let Some(handle) = endpoint.handle.take() {
            if woke {
                if handle.join().is_err() {
                    warn!("Sync subscriber thread panicked");
                }
            } else {
                debug!("Subscriber socket unreachable, detaching thread");
            }
        }

        let _ = std::fs::remove_file(&endpoint.socket_path);
        *self.callback.lock().unwrap_or_else(PoisonError::into_inner) = None;
        debug!(socket = %endpoint.socket_path.display(), "Closed sync subscriber");
    }
}

impl Drop for BroadcastChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{LayerDraft, LayerId, Locale};
    use std::sync::mpsc;

    fn snapshot(text: &str) -> Snapshot {
        vec![LayerDraft::text(text).build(LayerId::generate(), Locale::En).unwrap()]
    }

    fn subscriber(dir: &Path) -> (BroadcastChannel, mpsc::Receiver<Snapshot>) {
        let (tx, rx) = mpsc::channel();
        let mut channel = BroadcastChannel::open(dir, "overlay-sync").unwrap();
        channel
            .on_update(Box::new(move |snapshot| {
                let _ = tx.send(snapshot);
            }))
            .unwrap();
        (channel, rx)
    }

    #[test]
    fn test_fan_out_to_two_subscribers() {
        let dir = tempfile::tempdir().unwrap();
        let (_a, rx_a) = subscriber(dir.path());
        let (_b, rx_b) = subscriber(dir.path());
        let publisher = BroadcastChannel::open(dir.path(), "overlay-sync").unwrap();

        let layers = snapshot("HOME");
        publisher.post_update(&layers);

        let timeout = Duration::from_secs(5);
        assert_eq!(rx_a.recv_timeout(timeout).unwrap(), layers);
        assert_eq!(rx_b.recv_timeout(timeout).unwrap(), layers);
    }

    #[test]
    fn test_delivery_preserves_publish_order() {
        let dir = tempfile::tempdir().unwrap();
        let (_sub, rx) = subscriber(dir.path());
        let publisher = BroadcastChannel::open(dir.path(), "overlay-sync").unwrap();

        for n in 0..5 {
            publisher.post_update(&snapshot(&format!("SCORE {n}")));
        }
        for n in 0..5 {
            let received = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(received[0].name, format!("Text: SCORE {n}"));
        }
    }

    #[test]
    fn test_publisher_skips_own_socket() {
        let dir = tempfile::tempdir().unwrap();
        let (channel, rx) = subscriber(dir.path());
        channel.post_update(&snapshot("SELF"));
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (mut channel, _rx) = subscriber(dir.path());
        let path = channel.socket_path().unwrap().to_path_buf();
        assert!(path.exists());

        channel.close();
        assert!(!path.exists());
        channel.close();
        assert!(channel.socket_path().is_none());
        assert!(channel.on_update(Box::new(|_| {})).is_err());
    }

    #[test]
    fn test_stale_socket_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let channel_dir = dir.path().join("overlay-sync");
        std::fs::create_dir_all(&channel_dir).unwrap();
        let stale = channel_dir.join("dead.sock");
        drop(UnixListener::bind(&stale).unwrap());
        assert!(stale.exists());

        let publisher = BroadcastChannel::open(dir.path(), "overlay-sync").unwrap();
        publisher.post_update(&snapshot("X"));
        assert!(!stale.exists());
    }

    #[test]
    fn test_non_update_frames_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let (channel, rx) = subscriber(dir.path());
        let path = channel.socket_path().unwrap().to_path_buf();

        let mut stream = UnixStream::connect(&path).unwrap();
        write_frame(&mut stream, br#"{"type":"ping"}"#).unwrap();
        drop(stream);

        let layers = snapshot("AFTER");
        let publisher = BroadcastChannel::open(dir.path(), "overlay-sync").unwrap();
        publisher.post_update(&layers);

        // The ping is skipped, the first delivery is the real update
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), layers);
    }
}
