//! Runtime configuration read from the environment.
//!
//! | Variable | Default |
//! |---|---|
//! | `OSS_WATCH_STATE_DIR` | `$HOME/.oss-watch` |
//! | `OSS_WATCH_CONFIG` | `<state_dir>/watchlist.json` |
//! | `OSS_WATCH_CONCURRENCY` | 4 |
//! | `OSS_WATCH_REQUEST_TIMEOUT_SECS` | 30 |
//! | `GITHUB_TOKEN` | unset (anonymous requests) |
//!
//! Unset or unparsable values fall back to the default.

use std::path::PathBuf;
use std::time::Duration;

use crate::github::transport::DEFAULT_REQUEST_TIMEOUT;

/// Default number of repositories processed at once.
const DEFAULT_CONCURRENCY: usize = 4;

/// Directory name used under `$HOME` when no state dir is configured.
const DEFAULT_STATE_DIR_NAME: &str = ".oss-watch";

const WATCH_LIST_FILE: &str = "watchlist.json";

#[derive(Clone)]
pub struct WatchConfig {
    /// Root directory for per-repository snapshots.
    pub state_dir: PathBuf,

    /// Location of the watch-list file.
    pub watch_list_path: PathBuf,

    /// Upper bound on repositories in flight. Always at least 1.
    pub concurrency: usize,

    pub request_timeout: Duration,

    pub github_token: Option<String>,
}

// Keeps the token out of logs.
impl std::fmt::Debug for WatchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchConfig")
            .field("state_dir", &self.state_dir)
            .field("watch_list_path", &self.watch_list_path)
            .field("concurrency", &self.concurrency)
            .field("request_timeout", &self.request_timeout)
            .field("github_token", &self.github_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl WatchConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let state_dir = non_empty("OSS_WATCH_STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| match non_empty("HOME") {
                Some(home) => PathBuf::from(home).join(DEFAULT_STATE_DIR_NAME),
                None => PathBuf::from(DEFAULT_STATE_DIR_NAME),
            });

        let watch_list_path = non_empty("OSS_WATCH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| state_dir.join(WATCH_LIST_FILE));

        let concurrency = non_empty("OSS_WATCH_CONCURRENCY")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_CONCURRENCY);

        let request_timeout = non_empty("OSS_WATCH_REQUEST_TIMEOUT_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        WatchConfig {
            state_dir,
            watch_list_path,
            concurrency,
            request_timeout,
            github_token: non_empty("GITHUB_TOKEN"),
        }
    }
}
