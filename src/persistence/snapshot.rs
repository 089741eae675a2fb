//! On-disk snapshot files.
//!
//! Each watched repository has one file holding its latest baseline:
//!
//! ```text
//! <state_dir>/<owner>/<name>/snapshot.json
//! ```
//!
//! # Atomic Writes
//!
//! Files are written atomically using a write-to-temp-then-rename pattern:
//! 1. Write to `snapshot.json.tmp`
//! 2. fsync the file
//! 3. Rename to `snapshot.json`
//! 4. fsync the directory
//!
//! Readers always see either the old or the new snapshot, never a partial write.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::fsync::{fsync_dir, fsync_file};
use crate::types::RepoSnapshot;

/// Current schema version. Increment when making breaking changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors that can occur during snapshot operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Schema version mismatch.
    #[error("schema version mismatch: expected {expected}, got {got}")]
    SchemaMismatch { expected: u32, got: u32 },
}

/// Result type for snapshot operations.
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// The JSON document stored for each repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    /// Schema version for forward-compatible migrations.
    pub schema_version: u32,

    /// When this file was written.
    pub stored_at: DateTime<Utc>,

    pub snapshot: RepoSnapshot,
}

impl PersistedSnapshot {
    pub fn new(snapshot: RepoSnapshot) -> Self {
        PersistedSnapshot {
            schema_version: SCHEMA_VERSION,
            stored_at: Utc::now(),
            snapshot,
        }
    }
}

/// Serializes `value` as JSON and writes it to `path` atomically.
///
/// On error the previous contents of `path` are left untouched and the temp
/// file is removed.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    // Serialize before touching the filesystem
    let bytes = serde_json::to_vec_pretty(value)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let written = (|| -> io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(&bytes)?;
        fsync_file(&file)?;
        std::fs::rename(&tmp_path, path)
    })();

    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    if let Some(parent) = path.parent() {
        fsync_dir(parent)?;
    }

    Ok(())
}

/// Reads a JSON file, returning None if it doesn't exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Saves a snapshot atomically to disk.
pub fn save_snapshot_atomic(path: &Path, snapshot: &RepoSnapshot) -> Result<()> {
    write_json_atomic(path, &PersistedSnapshot::new(snapshot.clone()))
}

/// Loads a snapshot, returning None if the file doesn't exist.
///
/// Malformed JSON and schema mismatches are errors.
pub fn try_load_snapshot(path: &Path) -> Result<Option<RepoSnapshot>> {
    let Some(persisted) = read_json::<PersistedSnapshot>(path)? else {
        return Ok(None);
    };

    if persisted.schema_version != SCHEMA_VERSION {
        return Err(SnapshotError::SchemaMismatch {
            expected: SCHEMA_VERSION,
            got: persisted.schema_version,
        });
    }

    Ok(Some(persisted.snapshot))
}
