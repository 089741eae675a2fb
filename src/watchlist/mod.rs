//! The user's list of watched repositories and the events each one reports.
//!
//! Stored as plain JSON:
//!
//! ```text
//! {"repos": [{"repo": "owner/name", "events": ["stars", "pull_requests"]}]}
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persistence::{SnapshotError, read_json, write_json_atomic};
use crate::types::{EventKind, RepoIdentity, UnknownEventKind};

/// Errors from watch-list edits and file access.
#[derive(Debug, Error)]
pub enum WatchListError {
    #[error("invalid event type: {0}")]
    InvalidEvent(#[from] UnknownEventKind),

    #[error("repository {0} is not in the watch list")]
    NotWatched(RepoIdentity),

    #[error("no events specified for {0}")]
    NoEvents(RepoIdentity),

    #[error("failed to read or write watch list: {0}")]
    Persist(#[from] SnapshotError),
}

/// One watched repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoWatch {
    pub repo: RepoIdentity,
    pub events: Vec<EventKind>,
}

impl RepoWatch {
    pub fn is_enabled(&self, kind: EventKind) -> bool {
        self.events.contains(&kind)
    }
}

/// Ordered watch list. Each repository appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchList {
    #[serde(default)]
    pub repos: Vec<RepoWatch>,
}

impl WatchList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the list from `path`; a missing file is an empty list.
    pub fn load(path: &Path) -> Result<Self, WatchListError> {
        Ok(read_json(path)?.unwrap_or_default())
    }

    /// Writes the list atomically.
    pub fn save(&self, path: &Path) -> Result<(), WatchListError> {
        write_json_atomic(path, self)?;
        Ok(())
    }

    /// Parses user-supplied event names such as `["stars", "forks"]`.
    pub fn parse_events<S: AsRef<str>>(names: &[S]) -> Result<Vec<EventKind>, WatchListError> {
        Ok(EventKind::parse_list(names)?)
    }

    pub fn get(&self, repo: &RepoIdentity) -> Option<&RepoWatch> {
        self.repos.iter().find(|w| &w.repo == repo)
    }

    /// Watched repositories in list order.
    pub fn identities(&self) -> Vec<RepoIdentity> {
        self.repos.iter().map(|w| w.repo.clone()).collect()
    }

    /// Adds a repository, or replaces its event kinds if already present.
    ///
    /// An empty `events` subscribes to every kind.
    pub fn add(&mut self, repo: RepoIdentity, events: Vec<EventKind>) {
        let events = if events.is_empty() {
            EventKind::ALL.to_vec()
        } else {
            events
        };

        match self.repos.iter_mut().find(|w| w.repo == repo) {
            Some(existing) => existing.events = events,
            None => self.repos.push(RepoWatch { repo, events }),
        }
    }

    /// Changes the event kinds of an already watched repository.
    pub fn set_events(
        &mut self,
        repo: &RepoIdentity,
        events: Vec<EventKind>,
    ) -> Result<(), WatchListError> {
        if events.is_empty() {
            return Err(WatchListError::NoEvents(repo.clone()));
        }
        let existing = self
            .repos
            .iter_mut()
            .find(|w| &w.repo == repo)
            .ok_or_else(|| WatchListError::NotWatched(repo.clone()))?;
        existing.events = events;
        Ok(())
    }

    pub fn remove(&mut self, repo: &RepoIdentity) -> Result<RepoWatch, WatchListError> {
        let index = self
            .repos
            .iter()
            .position(|w| &w.repo == repo)
            .ok_or_else(|| WatchListError::NotWatched(repo.clone()))?;
        Ok(self.repos.remove(index))
    }
}
