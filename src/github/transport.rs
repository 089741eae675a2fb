//! Raw HTTP access to the GitHub REST API.
//!
//! [`Transport`] is the seam between the typed API client and the network. It
//! returns the status and body of whatever the server answered; turning
//! statuses into errors is the client's job. The only thing decided here is
//! what kind of failure occurred when *no* response was received.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use octocrab::service::middleware::retry::RetryConfig;
use thiserror::Error;
use tracing::trace;

/// What went wrong when a request produced no response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailureKind {
    /// The request did not complete within the timeout.
    Timeout,

    /// The connection could not be established or was reset.
    Connection,

    /// Anything else (malformed URI, TLS setup, ...).
    Other,
}

/// A request that never produced an HTTP response.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportFailure {
    pub kind: TransportFailureKind,
    pub message: String,
}

impl TransportFailure {
    pub fn new(kind: TransportFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// An HTTP response of any status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,

    /// Value of `x-ratelimit-remaining`, if present.
    pub rate_limit_remaining: Option<u64>,

    /// Value of `x-ratelimit-reset`, if present.
    pub rate_limit_reset: Option<DateTime<Utc>>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues GET requests against the API.
///
/// `path` is relative to the API root, e.g. `repos/rust-lang/rust`.
pub trait Transport {
    fn get(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<TransportResponse, TransportFailure>> + Send;
}

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// [`Transport`] backed by an octocrab client.
#[derive(Clone)]
pub struct OctocrabTransport {
    client: Octocrab,
    request_timeout: Duration,
}

impl OctocrabTransport {
    /// Wraps an existing client.
    ///
    /// The client must be built with octocrab's retry layer disabled
    /// (`RetryConfig::None`); otherwise every attempt made by
    /// [`retry_with_backoff`](super::retry_with_backoff) is resent by octocrab
    /// without any backoff.
    pub fn new(client: Octocrab, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }

    /// Creates a transport authenticated with a personal access token.
    ///
    /// Without a token requests are anonymous, which GitHub limits to 60 per hour.
    pub fn from_token(
        token: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, octocrab::Error> {
        Self::with_base_uri(token, None, request_timeout)
    }

    /// Like [`from_token`](Self::from_token), against a different API root
    /// such as a GitHub Enterprise server.
    pub fn with_base_uri(
        token: Option<String>,
        base_uri: Option<&str>,
        request_timeout: Duration,
    ) -> Result<Self, octocrab::Error> {
        // Retries are ours; octocrab's layer would resend immediately.
        let mut builder = Octocrab::builder().add_retry_config(RetryConfig::None);
        if let Some(token) = token {
            builder = builder.personal_token(token);
        }
        if let Some(base_uri) = base_uri {
            builder = builder.base_uri(base_uri)?;
        }
        Ok(Self::new(builder.build()?, request_timeout))
    }

    async fn fetch(&self, uri: String) -> Result<TransportResponse, TransportFailure> {
        let response = self
            .client
            ._get(uri)
            .await
            .map_err(|e| classify_octocrab_error(&e))?;

        let status = response.status().as_u16();
        let (rate_limit_remaining, rate_limit_reset) = {
            let header = |name: &str| {
                response
                    .headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
            };
            let reset = header("x-ratelimit-reset")
                .and_then(|secs| i64::try_from(secs).ok())
                .and_then(|secs| DateTime::from_timestamp(secs, 0));
            (header("x-ratelimit-remaining"), reset)
        };

        let body = self
            .client
            .body_to_string(response)
            .await
            .map_err(|e| classify_octocrab_error(&e))?;

        Ok(TransportResponse {
            status,
            body,
            rate_limit_remaining,
            rate_limit_reset,
        })
    }
}

impl Transport for OctocrabTransport {
    async fn get(&self, path: &str) -> Result<TransportResponse, TransportFailure> {
        let uri = format!("/{}", path.trim_start_matches('/'));
        trace!(%uri, "GET");

        match tokio::time::timeout(self.request_timeout, self.fetch(uri.clone())).await {
            Ok(result) => result,
            Err(_) => Err(TransportFailure::new(
                TransportFailureKind::Timeout,
                format!(
                    "GET {} timed out after {}s",
                    uri,
                    self.request_timeout.as_secs()
                ),
            )),
        }
    }
}

impl std::fmt::Debug for OctocrabTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OctocrabTransport")
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

/// Maps an octocrab error that happened before a response arrived.
///
/// octocrab doesn't expose a stable way to tell network failures apart, so
/// this looks at the whole error chain's text.
fn classify_octocrab_error(err: &octocrab::Error) -> TransportFailure {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }

    TransportFailure::new(classify_failure_message(&message), message)
}

fn classify_failure_message(message: &str) -> TransportFailureKind {
    let message_lower = message.to_lowercase();
    if message_lower.contains("timeout") || message_lower.contains("timed out") {
        TransportFailureKind::Timeout
    } else if message_lower.contains("connection")
        || message_lower.contains("connect")
        || message_lower.contains("network")
        || message_lower.contains("dns")
        || message_lower.contains("broken pipe")
        || message_lower.contains("reset by peer")
    {
        TransportFailureKind::Connection
    } else {
        TransportFailureKind::Other
    }
}
