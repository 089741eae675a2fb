//! Watch passes over many repositories.
//!
//! Each repository is processed independently (fetch, diff against the
//! stored baseline, store the new baseline) with bounded concurrency across
//! repositories. One repository's failure is reported in its own result and
//! never stops the pass.

mod orchestrator;


pub use orchestrator::{RegisterError, RepoResult, WatchError, WatchOrchestrator};
