//! Last-seen snapshot per watched repository.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::snapshot::{Result, save_snapshot_atomic, try_load_snapshot};
use crate::types::{RepoIdentity, RepoSnapshot};

/// File name of a repository's baseline inside its directory.
const SNAPSHOT_FILE: &str = "snapshot.json";

/// Storage for the most recent baseline of each repository.
///
/// `store` replaces the whole entry or leaves the old one untouched; there are
/// no partial updates and no expiry.
pub trait SnapshotCache {
    /// Returns the stored baseline, or None if the repository was never observed.
    fn load(&self, repo: &RepoIdentity) -> Result<Option<RepoSnapshot>>;

    /// Replaces the baseline for `repo`.
    fn store(&self, repo: &RepoIdentity, snapshot: &RepoSnapshot) -> Result<()>;
}

/// Snapshot cache backed by one JSON file per repository.
///
/// Survives restarts. Stores to the same repository are serialized by a
/// per-repository lock; different repositories never contend.
#[derive(Debug)]
pub struct FileSnapshotCache {
    state_dir: PathBuf,
    locks: Mutex<HashMap<RepoIdentity, Arc<Mutex<()>>>>,
}

impl FileSnapshotCache {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Path of the snapshot file for `repo`.
    pub fn snapshot_path(&self, repo: &RepoIdentity) -> PathBuf {
        self.state_dir
            .join(path_component(repo.owner()))
            .join(path_component(repo.name()))
            .join(SNAPSHOT_FILE)
    }

    fn lock_for(&self, repo: &RepoIdentity) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(repo.clone()).or_default().clone()
    }
}

impl SnapshotCache for FileSnapshotCache {
    fn load(&self, repo: &RepoIdentity) -> Result<Option<RepoSnapshot>> {
        try_load_snapshot(&self.snapshot_path(repo))
    }

    fn store(&self, repo: &RepoIdentity, snapshot: &RepoSnapshot) -> Result<()> {
        let lock = self.lock_for(repo);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let path = self.snapshot_path(repo);
        save_snapshot_atomic(&path, snapshot)?;
        debug!(%repo, path = %path.display(), "Stored snapshot");
        Ok(())
    }
}

/// Maps an owner or repository name to a safe single path component.
///
/// GitHub names only use `[A-Za-z0-9._-]`, which pass through unchanged.
/// Every other byte is percent-encoded, as are names made only of dots, so
/// distinct names always get distinct directories inside the state directory.
fn path_component(name: &str) -> String {
    let all_dots = name.bytes().all(|b| b == b'.');
    let mut escaped = String::with_capacity(name.len());
    for byte in name.bytes() {
        let plain = byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.');
        if plain && !all_dots {
            escaped.push(char::from(byte));
        } else {
            escaped.push_str(&format!("%{:02X}", byte));
        }
    }
    escaped
}

/// In-process snapshot cache. Contents are lost when dropped.
#[derive(Debug, Default)]
pub struct MemorySnapshotCache {
    entries: Mutex<HashMap<RepoIdentity, RepoSnapshot>>,
}

impl MemorySnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotCache for MemorySnapshotCache {
    fn load(&self, repo: &RepoIdentity) -> Result<Option<RepoSnapshot>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(repo).cloned())
    }

    fn store(&self, repo: &RepoIdentity, snapshot: &RepoSnapshot) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(repo.clone(), snapshot.clone());
        Ok(())
    }
}
