//! GitHub API client.
//!
//! Key features:
//! - Exponential backoff retry for transient failures, with jitter
//! - Distinguishes transient vs permanent errors at the transport boundary
//! - Cancellation of in-flight requests and pending retry delays
//! - Pluggable [`Transport`] so tests never touch the network

mod client;
mod error;
mod retry;
pub mod transport;

pub use client::{ApiClient, RepoData};
pub use error::{GitHubApiError, GitHubErrorKind, RetryClass};
pub use retry::{RetryPolicy, RetryResult, retry_with_backoff};
pub use transport::{
    OctocrabTransport, Transport, TransportFailure, TransportFailureKind, TransportResponse,
};
