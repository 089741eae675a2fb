//! Drives one watch pass: fetch, compare with the baseline, store, report.

use futures::{StreamExt, stream};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::diff::{diff, filter_events};
use crate::github::{ApiClient, GitHubApiError, Transport};
use crate::persistence::{SnapshotCache, SnapshotError};
use crate::types::{EventKind, RepoIdentity, WatchEvent};
use crate::watchlist::WatchList;

/// Why a single repository produced no events in this pass.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    Api(#[from] GitHubApiError),

    #[error("snapshot cache error: {0}")]
    Cache(#[from] SnapshotError),
}

/// Errors from [`WatchOrchestrator::register`].
#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("repository {0} not found")]
    NotFound(RepoIdentity),

    #[error(transparent)]
    Api(#[from] GitHubApiError),
}

/// Outcome of one repository in a pass.
#[derive(Debug)]
pub struct RepoResult {
    pub repo: RepoIdentity,
    pub outcome: Result<Vec<WatchEvent>, WatchError>,
}

impl RepoResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Events, or an empty slice if the repository failed.
    pub fn events(&self) -> &[WatchEvent] {
        match &self.outcome {
            Ok(events) => events,
            Err(_) => &[],
        }
    }

    pub fn error(&self) -> Option<&WatchError> {
        self.outcome.as_ref().err()
    }
}

/// Runs watch passes over a set of repositories.
///
/// Each repository is handled independently: a failure in one is recorded in
/// its [`RepoResult`] and never affects the others. At most `concurrency`
/// repositories are in flight, and results come back in input order.
#[derive(Debug)]
pub struct WatchOrchestrator<T, C> {
    client: ApiClient<T>,
    cache: C,
    concurrency: usize,
}

impl<T: Transport, C: SnapshotCache> WatchOrchestrator<T, C> {
    /// A `concurrency` of zero is treated as one.
    pub fn new(client: ApiClient<T>, cache: C, concurrency: usize) -> Self {
        Self {
            client,
            cache,
            concurrency: concurrency.max(1),
        }
    }

    pub fn client(&self) -> &ApiClient<T> {
        &self.client
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Runs one pass over `repos` and returns a result per repository, in order.
    pub async fn run_once(
        &self,
        repos: &[RepoIdentity],
        cancel: &CancellationToken,
    ) -> Vec<RepoResult> {
        info!(
            repos = repos.len(),
            concurrency = self.concurrency,
            "Starting watch pass"
        );

        let results: Vec<RepoResult> = stream::iter(repos)
            .map(|repo| self.process(repo, cancel))
            .buffered(self.concurrency)
            .collect()
            .await;

        let failed = results.iter().filter(|r| !r.is_success()).count();
        let events: usize = results.iter().map(|r| r.events().len()).sum();
        info!(events, failed, "Watch pass complete");

        results
    }

    /// Runs one pass over the watch list, keeping only the event kinds each
    /// entry subscribed to.
    pub async fn run_watch_list(
        &self,
        list: &WatchList,
        cancel: &CancellationToken,
    ) -> Vec<RepoResult> {
        let mut results = self.run_once(&list.identities(), cancel).await;

        for (result, watch) in results.iter_mut().zip(&list.repos) {
            if let Ok(events) = &mut result.outcome {
                *events = filter_events(std::mem::take(events), &watch.events);
            }
        }

        results
    }

    /// Adds `repo` to `list` after confirming it exists on GitHub.
    ///
    /// An empty `kinds` subscribes to every event kind. The list is only
    /// modified on success.
    pub async fn register(
        &self,
        list: &mut WatchList,
        repo: RepoIdentity,
        kinds: Vec<EventKind>,
        cancel: &CancellationToken,
    ) -> Result<(), RegisterError> {
        if !self.client.repo_exists(&repo, cancel).await? {
            return Err(RegisterError::NotFound(repo));
        }

        info!(%repo, "Registered repository");
        list.add(repo, kinds);
        Ok(())
    }

    #[instrument(skip_all, fields(repo = %repo))]
    async fn process(&self, repo: &RepoIdentity, cancel: &CancellationToken) -> RepoResult {
        let outcome = self.watch_repo(repo, cancel).await;

        match &outcome {
            Ok(events) => debug!(events = events.len(), "Repository checked"),
            Err(e) => warn!(error = %e, "Repository check failed"),
        }

        RepoResult {
            repo: repo.clone(),
            outcome,
        }
    }

    async fn watch_repo(
        &self,
        repo: &RepoIdentity,
        cancel: &CancellationToken,
    ) -> Result<Vec<WatchEvent>, WatchError> {
        let current = self.client.fetch_snapshot(repo, cancel).await?;
        let previous = self.cache.load(repo)?;

        let events = diff(previous.as_ref(), &current);
        if previous.is_none() {
            debug!("No baseline yet, recording first snapshot");
        }

        // The fetched snapshot becomes the baseline even when nothing changed.
        self.cache.store(repo, &current)?;
        Ok(events)
    }
}
