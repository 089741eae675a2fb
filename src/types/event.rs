//! Change events produced by diffing two snapshots.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::PullRequestId;
use super::pr::PullRequestSummary;

/// A discrete change between two observations of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WatchEvent {
    NewStars { delta: u64 },
    NewForks { delta: u64 },
    NewIssues { delta: u64 },
    NewPullRequest { pr: PullRequestSummary },

    /// The PR left the open set. Closed and merged are indistinguishable here.
    ClosedPullRequest { id: PullRequestId },
}

impl WatchEvent {
    /// The category a watch-list entry must enable to receive this event.
    pub fn kind(&self) -> EventKind {
        match self {
            WatchEvent::NewStars { .. } => EventKind::Stars,
            WatchEvent::NewForks { .. } => EventKind::Forks,
            WatchEvent::NewIssues { .. } => EventKind::Issues,
            WatchEvent::NewPullRequest { .. } | WatchEvent::ClosedPullRequest { .. } => {
                EventKind::PullRequests
            }
        }
    }
}

impl fmt::Display for WatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchEvent::NewStars { delta } => write!(f, "+{} stars", delta),
            WatchEvent::NewForks { delta } => write!(f, "+{} forks", delta),
            WatchEvent::NewIssues { delta } => write!(f, "+{} open issues", delta),
            WatchEvent::NewPullRequest { pr } => {
                write!(f, "new pull request {}: {}", pr.number, pr.title)
            }
            WatchEvent::ClosedPullRequest { id } => {
                write!(f, "pull request {} closed or merged", id)
            }
        }
    }
}

/// Error for an event kind name that isn't one of the four known ones.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown event kind '{0}' (expected one of: stars, issues, pull_requests, forks)")]
pub struct UnknownEventKind(pub String);

/// Event categories a watch-list entry can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Stars,
    Issues,
    PullRequests,
    Forks,
}

impl EventKind {
    /// All kinds, in the order new watch-list entries list them.
    pub const ALL: [EventKind; 4] = [
        EventKind::Stars,
        EventKind::Issues,
        EventKind::PullRequests,
        EventKind::Forks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Stars => "stars",
            EventKind::Issues => "issues",
            EventKind::PullRequests => "pull_requests",
            EventKind::Forks => "forks",
        }
    }

    /// Parses a list of kind names, failing on the first unknown one.
    ///
    /// Duplicates are dropped; the first occurrence's position wins.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<EventKind>, UnknownEventKind> {
        let mut kinds = Vec::with_capacity(names.len());
        for name in names {
            let kind: EventKind = name.as_ref().parse()?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "stars" => Ok(EventKind::Stars),
            "issues" => Ok(EventKind::Issues),
            "pull_requests" => Ok(EventKind::PullRequests),
            "forks" => Ok(EventKind::Forks),
            other => Err(UnknownEventKind(other.to_string())),
        }
    }
}
