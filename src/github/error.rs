//! GitHub API error types.
//!
//! Every error carries two independent classifications:
//!
//! - [`GitHubErrorKind`] says *what* went wrong (not found, rate limited, ...)
//!   and is what callers match on.
//! - [`RetryClass`] says whether retrying can help. It is decided once, where
//!   the error is constructed from a transport outcome, so the retry loop never
//!   inspects transport-specific details.

use std::error::Error as StdError;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use super::transport::{TransportFailure, TransportFailureKind, TransportResponse};
use crate::types::RepoIdentity;

/// Whether an error is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Transient error - safe to retry with backoff.
    ///
    /// Examples:
    /// - HTTP 5xx (server errors)
    /// - HTTP 429 (rate limited)
    /// - HTTP 403 with rate limit signals
    /// - Network timeouts and dropped connections
    Transient,

    /// Permanent error - retrying would not change the outcome.
    ///
    /// Examples:
    /// - HTTP 4xx (except rate limits)
    /// - Response bodies that don't match the expected schema
    /// - Cancellation
    Permanent,
}

impl RetryClass {
    pub fn is_retriable(&self) -> bool {
        matches!(self, RetryClass::Transient)
    }
}

/// The kind of GitHub API failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitHubErrorKind {
    /// The repository does not exist, or is private and not visible to us.
    NotFound,

    /// The API quota is exhausted. See [`GitHubApiError::rate_limit_reset`].
    RateLimited,

    /// The response body did not match the expected schema.
    Decode,

    /// Anything else: network failures and unexpected HTTP statuses.
    Transport,

    /// The caller's cancellation token fired.
    Cancelled,

    /// Every attempt failed with a transient error.
    /// See [`GitHubApiError::last_error`].
    ExhaustedRetries { attempts: u32 },
}

/// A GitHub API error with categorization for retry decisions.
#[derive(Debug, Error)]
pub struct GitHubApiError {
    pub kind: GitHubErrorKind,

    pub class: RetryClass,

    /// The HTTP status code, if the failure came from a response.
    pub status_code: Option<u16>,

    /// A human-readable description of the error.
    pub message: String,

    /// The repository the failing request was about.
    pub repo: Option<RepoIdentity>,

    /// When the rate limit window resets, if the API told us.
    pub rate_limit_reset: Option<DateTime<Utc>>,

    #[source]
    pub source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl fmt::Display for GitHubApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GitHub API error")?;
        if let Some(code) = self.status_code {
            write!(f, " (HTTP {})", code)?;
        }
        if let Some(repo) = &self.repo {
            write!(f, " for {}", repo)?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(reset) = self.rate_limit_reset {
            write!(f, " (resets at {})", reset.to_rfc3339())?;
        }
        Ok(())
    }
}

impl GitHubApiError {
    fn new(kind: GitHubErrorKind, class: RetryClass, message: impl Into<String>) -> Self {
        Self {
            kind,
            class,
            status_code: None,
            message: message.into(),
            repo: None,
            rate_limit_reset: None,
            source: None,
        }
    }

    /// Creates a not-found error (HTTP 404).
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status_code: Some(404),
            ..Self::new(GitHubErrorKind::NotFound, RetryClass::Permanent, message)
        }
    }

    /// Creates a rate-limit error. Always transient.
    pub fn rate_limited(
        status_code: u16,
        message: impl Into<String>,
        reset: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            status_code: Some(status_code),
            rate_limit_reset: reset,
            ..Self::new(GitHubErrorKind::RateLimited, RetryClass::Transient, message)
        }
    }

    /// Creates a decode error from a JSON failure.
    pub fn decode(source: serde_json::Error) -> Self {
        Self {
            source: Some(Box::new(source)),
            ..Self::new(
                GitHubErrorKind::Decode,
                RetryClass::Permanent,
                "failed to decode JSON response",
            )
        }
    }

    /// Creates an error for an unexpected HTTP status.
    ///
    /// 5xx responses are transient; everything else is permanent.
    pub fn http_status(status_code: u16, message: impl Into<String>) -> Self {
        let class = if (500..600).contains(&status_code) {
            RetryClass::Transient
        } else {
            RetryClass::Permanent
        };
        Self {
            status_code: Some(status_code),
            ..Self::new(GitHubErrorKind::Transport, class, message)
        }
    }

    /// Creates a transport error from a failed request (no response received).
    pub fn transport(failure: TransportFailure) -> Self {
        let class = match failure.kind {
            TransportFailureKind::Timeout | TransportFailureKind::Connection => {
                RetryClass::Transient
            }
            TransportFailureKind::Other => RetryClass::Permanent,
        };
        Self {
            source: Some(Box::new(failure.clone())),
            ..Self::new(GitHubErrorKind::Transport, class, failure.message)
        }
    }

    /// Creates a transient transport error without a source.
    pub fn transient_without_source(message: impl Into<String>) -> Self {
        Self::new(GitHubErrorKind::Transport, RetryClass::Transient, message)
    }

    /// Creates a permanent transport error without a source.
    pub fn permanent_without_source(message: impl Into<String>) -> Self {
        Self::new(GitHubErrorKind::Transport, RetryClass::Permanent, message)
    }

    pub fn cancelled() -> Self {
        Self::new(
            GitHubErrorKind::Cancelled,
            RetryClass::Permanent,
            "operation cancelled",
        )
    }

    /// Wraps the last transient error after all attempts were used up.
    pub fn exhausted(attempts: u32, last_error: GitHubApiError) -> Self {
        Self {
            status_code: last_error.status_code,
            repo: last_error.repo.clone(),
            rate_limit_reset: last_error.rate_limit_reset,
            message: format!(
                "gave up after {} attempts: {}",
                attempts, last_error.message
            ),
            source: Some(Box::new(last_error)),
            kind: GitHubErrorKind::ExhaustedRetries { attempts },
            class: RetryClass::Permanent,
        }
    }

    /// Categorizes a non-success response.
    ///
    /// The decision is based on the status code, GitHub's rate limit headers
    /// and, for 403s, the error message in the body.
    pub fn from_response(response: &TransportResponse) -> Self {
        let message = error_message(&response.body);

        match response.status {
            404 => Self::not_found(message),
            429 => Self::rate_limited(429, message, response.rate_limit_reset),
            403 if response.rate_limit_remaining == Some(0) || is_rate_limit_error(&message) => {
                Self::rate_limited(403, message, response.rate_limit_reset)
            }
            status => Self::http_status(status, message),
        }
    }

    /// Attaches the repository the request was about, unless already set.
    pub fn with_repo(mut self, repo: &RepoIdentity) -> Self {
        if self.repo.is_none() {
            self.repo = Some(repo.clone());
        }
        self
    }

    pub fn is_retriable(&self) -> bool {
        self.class.is_retriable()
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == GitHubErrorKind::NotFound
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == GitHubErrorKind::Cancelled
    }

    /// For exhausted retries, the error returned by the final attempt.
    pub fn last_error(&self) -> Option<&GitHubApiError> {
        match self.kind {
            GitHubErrorKind::ExhaustedRetries { .. } => self
                .source
                .as_deref()
                .and_then(|e| e.downcast_ref::<GitHubApiError>()),
            _ => None,
        }
    }
}

/// GitHub's JSON error body.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Longest raw body excerpt kept in an error message.
const MAX_BODY_EXCERPT: usize = 200;

/// Extracts a readable message from an error response body.
fn error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.message;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    match trimmed.char_indices().nth(MAX_BODY_EXCERPT) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Checks if an error message indicates a rate limit.
fn is_rate_limit_error(message: &str) -> bool {
    let message_lower = message.to_lowercase();
    message_lower.contains("rate limit")
        || message_lower.contains("api rate")
        || message_lower.contains("secondary rate")
        || message_lower.contains("abuse detection")
}
