//! Durable storage for the committed layer snapshot
//!
//! One record per storage key. A write replaces the whole layer list or
//! nothing: the file backend writes a sibling temp file and renames it over
//! the record.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

use crate::constants::{storage, sync};
use crate::layer::Snapshot;

/// Which overlay configuration a store and channel are bound to
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Scope {
    /// The single configuration shared by every game
    #[default]
    Global,
    /// One configuration per game identifier
    Game(String),
}

impl Scope {
    /// Pick the scope for a viewer/editor route identifier
    ///
    /// The identifier only scopes storage when `scope_by_game` is enabled.
    pub fn for_route(game: Option<&str>, scope_by_game: bool) -> Self {
        match game {
            Some(id) if scope_by_game && !id.is_empty() => Scope::Game(id.to_string()),
            _ => Scope::Global,
        }
    }

    pub fn storage_key(&self) -> String {
        match self {
            Scope::Global => storage::STORAGE_KEY.to_string(),
            Scope::Game(id) => format!("{}-{}", storage::STORAGE_KEY, sanitize(id)),
        }
    }

    /// Name of the broadcast channel carrying this scope's snapshots
    pub fn channel_name(&self) -> String {
        match self {
            Scope::Global => sync::CHANNEL_NAME.to_string(),
            Scope::Game(id) => format!("{}-{}", sync::CHANNEL_NAME, sanitize(id)),
        }
    }
}

/// Keep identifiers safe for use as file names
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Read/write access to the committed snapshot
pub trait SnapshotStore: Send + Sync {
    /// `Ok(None)` when nothing has been written under this key yet
    fn read(&self) -> Result<Option<Snapshot>>;

    fn write(&self, snapshot: &Snapshot) -> Result<()>;

    /// File whose changes signal a new snapshot, if the backend has one
    fn watch_path(&self) -> Option<&Path> {
        None
    }
}

/// JSON file under the data directory, one per storage key
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(data_dir: &Path, scope: &Scope) -> Self {
        let file = format!("{}.{}", scope.storage_key(), storage::SNAPSHOT_EXTENSION);
        Self {
            path: data_dir.join(file),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn read(&self) -> Result<Option<Snapshot>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No persisted snapshot");
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read snapshot from {}", self.path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse snapshot JSON from {}", self.path.display()))?;

        debug!(path = %self.path.display(), layers = snapshot.len(), "Read snapshot");
        Ok(Some(snapshot))
    }

    fn write(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory {}", parent.display()))?;
        }

        let json = serde_json::to_vec(snapshot).context("Failed to serialize snapshot to JSON")?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .with_context(|| format!("Failed to write snapshot to {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace snapshot at {}", self.path.display()))?;

        info!(path = %self.path.display(), layers = snapshot.len(), "Wrote snapshot");
        Ok(())
    }

    fn watch_path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Process-local store, shared between clones
///
/// Holds the serialized form so readers never alias the writer's layers.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    record: Arc<Mutex<Option<String>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail, simulating an unavailable store
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn read(&self) -> Result<Option<Snapshot>> {
        let record = self.record.lock().unwrap_or_else(PoisonError::into_inner);
        record
            .as_deref()
            .map(|json| serde_json::from_str::<Snapshot>(json).context("Failed to parse stored snapshot"))
            .transpose()
    }

    fn write(&self, snapshot: &Snapshot) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("Snapshot storage is unavailable");
        }
        let json = serde_json::to_string(snapshot).context("Failed to serialize snapshot to JSON")?;
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = Some(json);
        Ok(())
    }
}
