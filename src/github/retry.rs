//! Exponential backoff retry logic for GitHub API calls.
//!
//! The retry loop only looks at [`RetryClass`](super::error::RetryClass):
//! transient errors are retried after a backoff delay, permanent errors are
//! returned immediately. Every wait and every attempt is raced against the
//! caller's cancellation token.

use std::future::Future;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::GitHubApiError;

/// Bounds for retrying a single operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first. At least 1.
    pub max_attempts: u32,

    /// Delay before the second attempt.
    pub initial_delay: Duration,

    /// Cap for exponential growth (applied before jitter).
    pub max_delay: Duration,

    /// Growth factor between consecutive delays. At least 1.0.
    pub backoff_multiplier: f64,

    /// Maximum jitter in percent of the delay, applied in both directions.
    pub jitter_percent: u8,
}

impl RetryPolicy {
    /// Default policy for API calls.
    ///
    /// - 4 attempts with 2s, 4s, 8s delays (±20%)
    /// - Total max wait: ~17 seconds
    pub const DEFAULT: Self = Self {
        max_attempts: 4,
        initial_delay: Duration::from_secs(2),
        max_delay: Duration::from_secs(16), // Won't hit this with 4 attempts
        backoff_multiplier: 2.0,
        jitter_percent: 20,
    };

    /// A single attempt, no retries.
    pub const NO_RETRY: Self = Self {
        max_attempts: 1,
        initial_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        backoff_multiplier: 1.0,
        jitter_percent: 0,
    };

    /// Creates a policy, clamping each value into its valid range.
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        let backoff_multiplier = if backoff_multiplier.is_finite() {
            backoff_multiplier.max(1.0)
        } else {
            1.0
        };
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay: max_delay.max(initial_delay),
            backoff_multiplier,
            jitter_percent: 0,
        }
    }

    /// Returns a copy with the given jitter (capped at 100%).
    pub fn with_jitter_percent(self, jitter_percent: u8) -> Self {
        Self {
            jitter_percent: jitter_percent.min(100),
            ..self
        }
    }

    /// Un-jittered delay before the given attempt (1-indexed).
    ///
    /// The first attempt runs immediately. Before attempt `n >= 2` the delay is
    /// `initial_delay * backoff_multiplier^(n-2)`, capped at `max_delay`.
    pub fn delay_before_attempt(&self, attempt: u32) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt - 2).unwrap_or(i32::MAX);
        let delay_secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped_secs = delay_secs.min(self.max_delay.as_secs_f64());
        // A cap near Duration::MAX doesn't survive the round trip through f64.
        Duration::try_from_secs_f64(capped_secs)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Delay before the given attempt with deterministic jitter applied.
    ///
    /// The same `(seed, attempt)` always gives the same delay; different seeds
    /// spread retries of concurrent callers apart.
    pub fn jittered_delay_before_attempt(&self, attempt: u32, seed: u64) -> Duration {
        let base = self.delay_before_attempt(attempt);
        if self.jitter_percent == 0 || base.is_zero() {
            return base;
        }

        let mut hasher = DefaultHasher::new();
        (seed, attempt).hash(&mut hasher);
        let span = 2 * u64::from(self.jitter_percent) + 1;
        let offset = (hasher.finish() % span) as f64 - f64::from(self.jitter_percent);
        Duration::try_from_secs_f64(base.as_secs_f64() * (1.0 + offset / 100.0))
            .unwrap_or(Duration::MAX)
    }

    /// Returns an iterator over all un-jittered retry delays.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (2..=self.max_attempts).map(|attempt| self.delay_before_attempt(attempt))
    }

    /// Computes the total maximum wait time for all retries, before jitter.
    pub fn total_max_wait(&self) -> Duration {
        self.delays().fold(Duration::ZERO, Duration::saturating_add)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Result of a retry attempt.
#[derive(Debug)]
pub enum RetryResult<T> {
    /// The operation succeeded.
    Success(T),

    /// A transient error occurred on every attempt.
    ExhaustedRetries {
        /// The last error encountered.
        last_error: GitHubApiError,
        /// Number of attempts made (including the initial attempt).
        attempts: u32,
    },

    /// A permanent error occurred (not retriable).
    PermanentError(GitHubApiError),

    /// The cancellation token fired before the operation finished.
    Cancelled,
}

impl<T> RetryResult<T> {
    /// Converts to a Result, folding every failure into a [`GitHubApiError`].
    pub fn into_result(self) -> Result<T, GitHubApiError> {
        match self {
            RetryResult::Success(v) => Ok(v),
            RetryResult::ExhaustedRetries {
                last_error,
                attempts,
            } => Err(GitHubApiError::exhausted(attempts, last_error)),
            RetryResult::PermanentError(e) => Err(e),
            RetryResult::Cancelled => Err(GitHubApiError::cancelled()),
        }
    }

    /// Returns true if the result is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, RetryResult::Success(_))
    }
}

/// Executes an async operation with retry logic.
///
/// The operation is retried according to `policy` while it returns transient
/// errors. Permanent errors are returned immediately. If `cancel` fires, the
/// in-flight attempt or pending sleep is abandoned and
/// [`RetryResult::Cancelled`] is returned.
///
/// `jitter_seed` should differ between unrelated callers (e.g. a hash of the
/// repository) so that their retries don't line up.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    jitter_seed: u64,
    mut operation: F,
) -> RetryResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GitHubApiError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        if cancel.is_cancelled() {
            debug!(attempt, "Cancellation detected before attempt");
            return RetryResult::Cancelled;
        }

        let outcome = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!(attempt, "Attempt cancelled in flight");
                return RetryResult::Cancelled;
            }
            outcome = operation() => outcome,
        };

        let error = match outcome {
            Ok(value) => return RetryResult::Success(value),
            Err(e) if !e.is_retriable() => return RetryResult::PermanentError(e),
            Err(e) => e,
        };

        if attempt >= max_attempts {
            warn!(attempts = attempt, error = %error, "Giving up after transient failures");
            return RetryResult::ExhaustedRetries {
                last_error: error,
                attempts: attempt,
            };
        }

        let delay = policy.jittered_delay_before_attempt(attempt + 1, jitter_seed);
        warn!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Transient failure, retrying"
        );

        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!(attempt, "Backoff sleep cancelled");
                return RetryResult::Cancelled;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::error::GitHubErrorKind;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(1),
            Duration::from_millis(10),
            2.0,
        )
    }

    // ─── Unit Tests ───────────────────────────────────────────────────────────

    #[test]
    fn default_policy_values() {
        let policy = RetryPolicy::DEFAULT;
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.initial_delay, Duration::from_secs(2));
        assert_eq!(policy.backoff_multiplier, 2.0);
        assert_eq!(policy.jitter_percent, 20);
    }

    #[test]
    fn default_delays_are_2_4_8() {
        let delays: Vec<_> = RetryPolicy::DEFAULT.delays().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8)
            ]
        );
        assert_eq!(RetryPolicy::DEFAULT.total_max_wait(), Duration::from_secs(14));
    }

    #[test]
    fn first_attempt_has_no_delay() {
        assert_eq!(RetryPolicy::DEFAULT.delay_before_attempt(1), Duration::ZERO);
        assert_eq!(
            RetryPolicy::DEFAULT.jittered_delay_before_attempt(1, 7),
            Duration::ZERO
        );
    }

    #[test]
    fn delays_respect_cap() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(30), 2.0);
        let delays: Vec<_> = policy.delays().collect();

        assert_eq!(delays[0], Duration::from_secs(1));
        assert_eq!(delays[4], Duration::from_secs(16));
        for delay in &delays[5..] {
            assert_eq!(*delay, Duration::from_secs(30));
        }
    }

    #[test]
    fn uncapped_policy_saturates_instead_of_panicking() {
        let policy = RetryPolicy::new(80, Duration::from_secs(1), Duration::MAX, 2.0)
            .with_jitter_percent(20);

        assert_eq!(policy.delay_before_attempt(70), Duration::MAX);
        assert!(policy.jittered_delay_before_attempt(70, 3) >= Duration::from_secs(1));
        assert_eq!(policy.total_max_wait(), Duration::MAX);
        // Small attempt numbers are unaffected by the huge cap.
        assert_eq!(policy.delay_before_attempt(4), Duration::from_secs(4));
    }

    #[test]
    fn new_clamps_out_of_range_values() {
        let policy = RetryPolicy::new(0, Duration::from_secs(5), Duration::from_secs(1), 0.5);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.max_delay, Duration::from_secs(5));
        assert_eq!(policy.backoff_multiplier, 1.0);

        assert_eq!(policy.with_jitter_percent(250).jitter_percent, 100);
    }

    #[test]
    fn no_retry_has_no_delays() {
        assert_eq!(RetryPolicy::NO_RETRY.delays().count(), 0);
    }

    #[tokio::test]
    async fn retry_success_on_first_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let cancel = CancellationToken::new();

        let result = retry_with_backoff(RetryPolicy::DEFAULT, &cancel, 0, move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, GitHubApiError>(42) }
        })
        .await;

        match result {
            RetryResult::Success(v) => assert_eq!(v, 42),
            _ => panic!("Expected success"),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_permanent_error_not_retried() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let cancel = CancellationToken::new();

        let result = retry_with_backoff(RetryPolicy::DEFAULT, &cancel, 0, move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, _>(GitHubApiError::not_found("Not Found")) }
        })
        .await;

        assert!(matches!(result, RetryResult::PermanentError(_)));
        assert_eq!(counter.load(Ordering::SeqCst), 1); // Only one attempt
    }

    #[tokio::test]
    async fn retry_transient_succeeds_on_third_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let cancel = CancellationToken::new();

        let result = retry_with_backoff(fast_policy(4), &cancel, 0, move || {
            let count = counter_clone.fetch_add(1, Ordering::SeqCst);
            async move {
                if count < 2 {
                    Err(GitHubApiError::http_status(502, "bad gateway"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert!(result.is_success());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_transient_exhausts_attempts() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let cancel = CancellationToken::new();

        let result = retry_with_backoff(fast_policy(3), &cancel, 0, move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, _>(GitHubApiError::rate_limited(429, "slow down", None)) }
        })
        .await;

        let err = result.into_result().unwrap_err();
        assert_eq!(err.kind, GitHubErrorKind::ExhaustedRetries { attempts: 3 });
        assert_eq!(
            err.last_error().map(|e| e.kind),
            Some(GitHubErrorKind::RateLimited)
        );
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn no_retry_policy_returns_after_one_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let cancel = CancellationToken::new();

        let result = retry_with_backoff(RetryPolicy::NO_RETRY, &cancel, 0, move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, _>(GitHubApiError::transient_without_source("error")) }
        })
        .await;

        assert!(matches!(
            result,
            RetryResult::ExhaustedRetries { attempts: 1, .. }
        ));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn already_cancelled_makes_no_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = retry_with_backoff(RetryPolicy::DEFAULT, &cancel, 0, move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, GitHubApiError>(1) }
        })
        .await;

        assert!(result.into_result().unwrap_err().is_cancelled());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancellation_interrupts_backoff_sleep() {
        let policy = RetryPolicy::new(5, Duration::from_secs(60), Duration::from_secs(60), 2.0);
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let result = retry_with_backoff(policy, &cancel, 0, move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, _>(GitHubApiError::http_status(503, "unavailable")) }
        })
        .await;

        assert!(matches!(result, RetryResult::Cancelled));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn cancellation_interrupts_in_flight_attempt() {
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result = retry_with_backoff(RetryPolicy::DEFAULT, &cancel, 0, || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, GitHubApiError>(1)
        })
        .await;

        assert!(matches!(result, RetryResult::Cancelled));
    }

    // ─── Property Tests ───────────────────────────────────────────────────────

    proptest! {
        #[test]
        fn delay_grows_exponentially_until_cap(
            initial_ms in 1u64..1000,
            max_ms in 1000u64..60000,
            multiplier in 1.0f64..3.0,
            attempt in 2u32..12,
        ) {
            let policy = RetryPolicy::new(
                12,
                Duration::from_millis(initial_ms),
                Duration::from_millis(max_ms),
                multiplier,
            );

            let delay = policy.delay_before_attempt(attempt);
            prop_assert!(delay <= Duration::from_millis(max_ms));

            if attempt > 2 {
                prop_assert!(delay >= policy.delay_before_attempt(attempt - 1));
            }
        }

        #[test]
        fn second_attempt_waits_initial_delay(
            initial_ms in 1u64..10000,
            max_ms in 10000u64..100000,
            multiplier in 1.0f64..3.0,
        ) {
            let policy = RetryPolicy::new(
                5,
                Duration::from_millis(initial_ms),
                Duration::from_millis(max_ms),
                multiplier,
            );
            prop_assert_eq!(policy.delay_before_attempt(2), Duration::from_millis(initial_ms));
        }

        #[test]
        fn jitter_stays_within_bounds(
            initial_ms in 100u64..10000,
            jitter in 0u8..=100,
            attempt in 2u32..8,
            seed in any::<u64>(),
        ) {
            let policy = RetryPolicy::new(
                8,
                Duration::from_millis(initial_ms),
                Duration::from_secs(600),
                2.0,
            )
            .with_jitter_percent(jitter);

            let base = policy.delay_before_attempt(attempt).as_secs_f64();
            let jittered = policy.jittered_delay_before_attempt(attempt, seed).as_secs_f64();
            let bound = base * f64::from(jitter) / 100.0 + 1e-6;

            prop_assert!((jittered - base).abs() <= bound);
            prop_assert_eq!(
                policy.jittered_delay_before_attempt(attempt, seed),
                policy.jittered_delay_before_attempt(attempt, seed)
            );
        }

        /// An always-transient operation runs exactly `max_attempts` times.
        #[test]
        fn retry_runs_exactly_max_attempts(max_attempts in 1u32..6) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            let policy = RetryPolicy::new(max_attempts, Duration::ZERO, Duration::ZERO, 1.0);
            let counter = Arc::new(AtomicU32::new(0));
            let counter_clone = counter.clone();
            let cancel = CancellationToken::new();

            let result = runtime.block_on(retry_with_backoff(policy, &cancel, 0, move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(GitHubApiError::transient_without_source("flaky")) }
            }));

            let err = result.into_result().unwrap_err();
            prop_assert_eq!(err.kind, GitHubErrorKind::ExhaustedRetries { attempts: max_attempts });
            prop_assert_eq!(counter.load(Ordering::SeqCst), max_attempts);
        }
    }
}
