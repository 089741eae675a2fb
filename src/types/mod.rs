//! Core domain types for the watcher.
//!
//! This module contains the values that flow between the API client, the
//! snapshot cache and the diff engine.

pub mod event;
pub mod ids;
pub mod pr;
pub mod snapshot;

// Re-export commonly used types at the module level
pub use event::{EventKind, UnknownEventKind, WatchEvent};
pub use ids::{InvalidRepoIdentity, PrNumber, PullRequestId, RepoIdentity};
pub use pr::{PrState, PullRequestSummary};
pub use snapshot::RepoSnapshot;
