//! oss-watch - polls GitHub repositories and reports what changed since the last look.
//!
//! This library provides the API client, snapshot cache, diff engine and the
//! orchestrator that ties them together.

pub mod config;
pub mod diff;
pub mod github;
pub mod persistence;
pub mod types;
pub mod watchlist;
pub mod worker;

#[cfg(test)]
mod test_utils;
