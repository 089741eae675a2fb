//! Snapshot diffing.
//!
//! Turns two observations of the same repository into [`WatchEvent`]s.
//! Output order is fixed: stars, forks, issues, then pull request events by
//! ascending id.

use std::collections::BTreeMap;

use crate::types::{PullRequestId, PullRequestSummary, RepoSnapshot, WatchEvent};

/// Computes the events between a stored baseline and a fresh snapshot.
///
/// With no baseline (first observation) there is nothing to compare against
/// and no events are produced. Counters only report growth; a decrease
/// produces nothing.
pub fn diff(previous: Option<&RepoSnapshot>, current: &RepoSnapshot) -> Vec<WatchEvent> {
    let Some(previous) = previous else {
        return Vec::new();
    };

    let mut events = Vec::new();

    if let Some(delta) = growth(previous.stargazers(), current.stargazers()) {
        events.push(WatchEvent::NewStars { delta });
    }
    if let Some(delta) = growth(previous.forks(), current.forks()) {
        events.push(WatchEvent::NewForks { delta });
    }
    if let Some(delta) = growth(previous.open_issues(), current.open_issues()) {
        events.push(WatchEvent::NewIssues { delta });
    }

    events.extend(pull_request_events(
        previous.open_pull_requests(),
        current.open_pull_requests(),
    ));

    events
}

fn growth(previous: u64, current: u64) -> Option<u64> {
    current.checked_sub(previous).filter(|&delta| delta > 0)
}

/// Set difference of open PRs by id, as events sorted by id.
fn pull_request_events(
    previous: &[PullRequestSummary],
    current: &[PullRequestSummary],
) -> Vec<WatchEvent> {
    let before: BTreeMap<PullRequestId, &PullRequestSummary> =
        previous.iter().map(|pr| (pr.id, pr)).collect();
    let after: BTreeMap<PullRequestId, &PullRequestSummary> =
        current.iter().map(|pr| (pr.id, pr)).collect();

    // Opened and closed ids are disjoint, so a map keyed by id gives one
    // ascending sequence over both.
    let mut by_id: BTreeMap<PullRequestId, WatchEvent> = BTreeMap::new();

    for (id, pr) in &after {
        if !before.contains_key(id) {
            by_id.insert(
                *id,
                WatchEvent::NewPullRequest {
                    pr: (*pr).clone(),
                },
            );
        }
    }
    for id in before.keys() {
        if !after.contains_key(id) {
            by_id.insert(*id, WatchEvent::ClosedPullRequest { id: *id });
        }
    }

    by_id.into_values().collect()
}
