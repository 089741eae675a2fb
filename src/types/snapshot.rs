//! Point-in-time observation of a repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::pr::PullRequestSummary;

/// Immutable capture of a repository's observable counters and open PRs.
///
/// A fresh snapshot is built for every poll; there are no setters, so a
/// stored baseline can never change underneath a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSnapshot {
    stargazers: u64,
    forks: u64,
    open_issues: u64,
    open_pull_requests: Vec<PullRequestSummary>,
    observed_at: DateTime<Utc>,
}

impl RepoSnapshot {
    pub fn new(
        stargazers: u64,
        forks: u64,
        open_issues: u64,
        open_pull_requests: Vec<PullRequestSummary>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        RepoSnapshot {
            stargazers,
            forks,
            open_issues,
            open_pull_requests,
            observed_at,
        }
    }

    pub fn stargazers(&self) -> u64 {
        self.stargazers
    }

    pub fn forks(&self) -> u64 {
        self.forks
    }

    pub fn open_issues(&self) -> u64 {
        self.open_issues
    }

    /// Open pull requests in the order the API listed them.
    pub fn open_pull_requests(&self) -> &[PullRequestSummary] {
        &self.open_pull_requests
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }
}
