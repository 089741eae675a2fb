//! Typed GitHub API client.
//!
//! `ApiClient` builds request paths, runs each request through
//! [`retry_with_backoff`], and turns responses into domain types. It holds no
//! mutable state; one instance is shared by every repository in a run.

use std::hash::{DefaultHasher, Hash, Hasher};

use chrono::Utc;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::error::GitHubApiError;
use super::retry::{RetryPolicy, retry_with_backoff};
use super::transport::Transport;
use crate::types::{PrState, PullRequestSummary, RepoIdentity, RepoSnapshot};

/// Page size for list endpoints (GitHub's maximum).
const PER_PAGE: u32 = 100;

/// Repository counters from `GET /repos/{owner}/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepoData {
    #[serde(rename = "stargazers_count")]
    pub stargazers: u64,

    #[serde(rename = "forks_count")]
    pub forks: u64,

    /// GitHub counts open pull requests as issues here.
    #[serde(rename = "open_issues_count")]
    pub open_issues: u64,
}

/// One element of `GET /repos/{owner}/{name}/pulls`.
#[derive(Debug, Deserialize)]
struct PullRequestResponse {
    id: u64,
    number: u64,
    state: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    merged_at: Option<String>,
}

impl PullRequestResponse {
    fn into_summary(self) -> PullRequestSummary {
        let state = match (self.state.as_str(), self.merged_at.is_some()) {
            (_, true) => PrState::Merged,
            ("closed", false) => PrState::Closed,
            _ => PrState::Open,
        };
        PullRequestSummary::new(self.id, self.number, state, self.title.unwrap_or_default())
    }
}

/// GitHub REST client over an injected [`Transport`].
#[derive(Debug, Clone)]
pub struct ApiClient<T> {
    transport: T,
    retry_policy: RetryPolicy,
}

impl<T: Transport> ApiClient<T> {
    /// Creates a client using [`RetryPolicy::DEFAULT`].
    pub fn new(transport: T) -> Self {
        Self::with_retry_policy(transport, RetryPolicy::DEFAULT)
    }

    pub fn with_retry_policy(transport: T, retry_policy: RetryPolicy) -> Self {
        Self {
            transport,
            retry_policy,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetches the repository's star, fork and issue counters.
    #[instrument(skip_all, fields(repo = %repo))]
    pub async fn fetch_repo_data(
        &self,
        repo: &RepoIdentity,
        cancel: &CancellationToken,
    ) -> Result<RepoData, GitHubApiError> {
        let path = format!("repos/{}/{}", repo.owner(), repo.name());
        self.get_json(repo, &path, cancel).await
    }

    /// Fetches the first page of open pull requests.
    #[instrument(skip_all, fields(repo = %repo))]
    pub async fn fetch_open_pull_requests(
        &self,
        repo: &RepoIdentity,
        cancel: &CancellationToken,
    ) -> Result<Vec<PullRequestSummary>, GitHubApiError> {
        let path = format!(
            "repos/{}/{}/pulls?state=open&per_page={}",
            repo.owner(),
            repo.name(),
            PER_PAGE
        );
        let prs: Vec<PullRequestResponse> = self.get_json(repo, &path, cancel).await?;
        Ok(prs
            .into_iter()
            .map(PullRequestResponse::into_summary)
            .collect())
    }

    /// Fetches everything needed for a diff and stamps it with the current time.
    pub async fn fetch_snapshot(
        &self,
        repo: &RepoIdentity,
        cancel: &CancellationToken,
    ) -> Result<RepoSnapshot, GitHubApiError> {
        let data = self.fetch_repo_data(repo, cancel).await?;
        let prs = self.fetch_open_pull_requests(repo, cancel).await?;
        Ok(RepoSnapshot::new(
            data.stargazers,
            data.forks,
            data.open_issues,
            prs,
            Utc::now(),
        ))
    }

    /// Checks whether the repository exists and is visible to us.
    ///
    /// Returns `Ok(false)` only for a not-found response; every other failure
    /// is propagated.
    pub async fn repo_exists(
        &self,
        repo: &RepoIdentity,
        cancel: &CancellationToken,
    ) -> Result<bool, GitHubApiError> {
        match self.fetch_repo_data(repo, cancel).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => {
                debug!(%repo, "Repository not found");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn get_json<R: DeserializeOwned>(
        &self,
        repo: &RepoIdentity,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<R, GitHubApiError> {
        let result = retry_with_backoff(self.retry_policy, cancel, jitter_seed(repo), || {
            self.get_once(path)
        })
        .await;

        result.into_result().map_err(|e| e.with_repo(repo))
    }

    /// Issues a single request without retry logic.
    async fn get_once<R: DeserializeOwned>(&self, path: &str) -> Result<R, GitHubApiError> {
        let response = self
            .transport
            .get(path)
            .await
            .map_err(GitHubApiError::transport)?;

        if !response.is_success() {
            return Err(GitHubApiError::from_response(&response));
        }

        serde_json::from_str(&response.body).map_err(GitHubApiError::decode)
    }
}

/// Per-repository seed so concurrent retries against different repositories
/// don't fire at the same instant.
fn jitter_seed(repo: &RepoIdentity) -> u64 {
    let mut hasher = DefaultHasher::new();
    repo.hash(&mut hasher);
    hasher.finish()
}
