//! Shared test doubles and arbitrary generators for property-based testing.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use proptest::prelude::*;

use crate::github::transport::{
    Transport, TransportFailure, TransportFailureKind, TransportResponse,
};
use crate::github::RetryPolicy;
use crate::types::{PrState, PullRequestSummary, RepoIdentity, RepoSnapshot};

pub fn repo(s: &str) -> RepoIdentity {
    RepoIdentity::parse(s).unwrap()
}

/// Three attempts with millisecond delays.
pub fn fast_retry_policy() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5), 2.0)
}

pub fn json_response(status: u16, body: &str) -> TransportResponse {
    TransportResponse {
        status,
        body: body.to_string(),
        rate_limit_remaining: None,
        rate_limit_reset: None,
    }
}

pub fn snapshot(stars: u64, forks: u64, issues: u64, prs: &[u64]) -> RepoSnapshot {
    let prs = prs
        .iter()
        .map(|&id| PullRequestSummary::open(id, id, format!("PR {}", id)))
        .collect();
    RepoSnapshot::new(stars, forks, issues, prs, Utc::now())
}

type Scripted = (Duration, Result<TransportResponse, TransportFailure>);

/// A [`Transport`] that replays queued responses per path.
///
/// When a path's queue has a single entry left, that entry is repeated for
/// every later call. Unscripted paths fail with a permanent transport error.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, path: &str, result: Result<TransportResponse, TransportFailure>) {
        self.push_delayed(path, Duration::ZERO, result);
    }

    pub fn push_delayed(
        &self,
        path: &str,
        delay: Duration,
        result: Result<TransportResponse, TransportFailure>,
    ) {
        self.scripts
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back((delay, result));
    }

    /// Replaces everything queued for a path.
    pub fn set(&self, path: &str, result: Result<TransportResponse, TransportFailure>) {
        self.set_delayed(path, Duration::ZERO, result);
    }

    /// Replaces everything queued for a path with a single delayed response.
    pub fn set_delayed(
        &self,
        path: &str,
        delay: Duration,
        result: Result<TransportResponse, TransportFailure>,
    ) {
        self.scripts
            .lock()
            .unwrap()
            .insert(path.to_string(), VecDeque::from([(delay, result)]));
    }

    pub fn calls(&self, path: &str) -> u32 {
        self.calls.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    fn next(&self, path: &str) -> Scripted {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default() += 1;

        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(path) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if queue.len() == 1 => queue[0].clone(),
            _ => (
                Duration::ZERO,
                Err(TransportFailure::new(
                    TransportFailureKind::Other,
                    format!("no scripted response for {}", path),
                )),
            ),
        }
    }
}

impl Transport for ScriptedTransport {
    async fn get(&self, path: &str) -> Result<TransportResponse, TransportFailure> {
        let (delay, result) = self.next(path);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }
}

/// Scripts both endpoints of a repository with successful responses.
pub fn script_repo(
    transport: &ScriptedTransport,
    repo: &str,
    stars: u64,
    forks: u64,
    issues: u64,
    pr_ids: &[u64],
) {
    let repo_body = format!(
        r#"{{"stargazers_count": {}, "forks_count": {}, "open_issues_count": {}}}"#,
        stars, forks, issues
    );
    let pulls_body = serde_json::to_string(
        &pr_ids
            .iter()
            .map(|id| {
                serde_json::json!({
                    "id": id,
                    "number": id,
                    "state": "open",
                    "title": format!("PR {}", id),
                })
            })
            .collect::<Vec<_>>(),
    )
    .unwrap();

    transport.set(&format!("repos/{}", repo), Ok(json_response(200, &repo_body)));
    transport.set(
        &format!("repos/{}/pulls?state=open&per_page=100", repo),
        Ok(json_response(200, &pulls_body)),
    );
}

// ─── Arbitrary generators ───

pub fn arb_datetime() -> impl Strategy<Value = DateTime<Utc>> {
    (946684800i64..4102444800i64).prop_map(|secs| DateTime::from_timestamp(secs, 0).unwrap())
}

pub fn arb_pr_state() -> impl Strategy<Value = PrState> {
    prop_oneof![
        Just(PrState::Open),
        Just(PrState::Closed),
        Just(PrState::Merged),
    ]
}

/// Snapshot whose PR ids are drawn from a small range so that two
/// independently generated snapshots overlap.
pub fn arb_snapshot() -> impl Strategy<Value = RepoSnapshot> {
    (
        0u64..10_000,
        0u64..10_000,
        0u64..10_000,
        prop::collection::btree_set(1u64..40, 0..15),
        arb_pr_state(),
        arb_datetime(),
    )
        .prop_map(|(stars, forks, issues, ids, state, observed_at)| {
            let prs = ids
                .into_iter()
                .rev()
                .map(|id| PullRequestSummary::new(id, id + 1000, state, format!("PR {}", id)))
                .collect();
            RepoSnapshot::new(stars, forks, issues, prs, observed_at)
        })
}
