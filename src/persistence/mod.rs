//! Persistence layer for repository baselines.
//!
//! # File Layout
//!
//! ```text
//! <state_dir>/<owner>/<name>/
//!   snapshot.json     # latest baseline, versioned envelope
//! ```
//!
//! # Crash Safety
//!
//! - Snapshots are written atomically using write-to-temp-then-rename
//! - Both the file and its directory are fsynced before a store returns

pub mod cache;
pub mod fsync;
pub mod snapshot;

pub use cache::{FileSnapshotCache, MemorySnapshotCache, SnapshotCache};
pub use fsync::{fsync_dir, fsync_file};
pub use snapshot::{
    PersistedSnapshot, SCHEMA_VERSION, SnapshotError, read_json, save_snapshot_atomic,
    try_load_snapshot, write_json_atomic,
};
