//! Pull request types as observed through the open-pull-request listing.

use serde::{Deserialize, Serialize};

use super::ids::{PrNumber, PullRequestId};

/// The state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrState {
    Open,
    Closed,
    Merged,
}

impl PrState {
    /// Returns true if the PR is open.
    pub fn is_open(&self) -> bool {
        matches!(self, PrState::Open)
    }
}

/// The subset of a pull request the watcher tracks between polls.
///
/// Identity is [`PullRequestSummary::id`]; the number is only for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestSummary {
    pub id: PullRequestId,
    pub number: PrNumber,
    pub state: PrState,
    pub title: String,
}

impl PullRequestSummary {
    pub fn new(
        id: impl Into<PullRequestId>,
        number: impl Into<PrNumber>,
        state: PrState,
        title: impl Into<String>,
    ) -> Self {
        PullRequestSummary {
            id: id.into(),
            number: number.into(),
            state,
            title: title.into(),
        }
    }

    /// Convenience constructor for an open PR.
    pub fn open(id: u64, number: u64, title: impl Into<String>) -> Self {
        Self::new(id, number, PrState::Open, title)
    }
}
