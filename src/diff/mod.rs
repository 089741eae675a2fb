//! Change detection between repository snapshots.

pub mod engine;

pub use engine::diff;

use crate::types::{EventKind, WatchEvent};

/// Keeps only events whose kind is enabled, preserving order.
pub fn filter_events(events: Vec<WatchEvent>, enabled: &[EventKind]) -> Vec<WatchEvent> {
    events
        .into_iter()
        .filter(|event| enabled.contains(&event.kind()))
        .collect()
}
