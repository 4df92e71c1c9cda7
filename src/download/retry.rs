//! Bounded exponential backoff for transcript fetches.
//!
//! The retry loop is an explicit state machine so that the ceiling and the
//! delay policy can be checked without touching the network:
//!
//! ```text
//! Attempting(n) --success------------------------------> Succeeded { attempts: n }
//! Attempting(n) --terminal error------------------------> Failed { attempts: n }
//! Attempting(n) --retryable error, n == max_attempts ---> Failed { attempts: n }
//! Attempting(n) --retryable error, n <  max_attempts ---> Retrying { next: n + 1, delay }
//! Retrying { next, .. } --after delay-------------------> Attempting(next)
//! ```

use std::time::Duration;

use crate::transcript::{FetchError, TranscriptFetcher, TranscriptSegment};

/// Backoff configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per video, the first one included
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound of any single delay
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Relative random spread applied to each delay (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-based),
    /// without jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());

        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }

    /// Backoff with the jitter spread applied
    pub fn jittered_backoff(&self, attempt: u32) -> Duration {
        let delay = self.backoff(attempt);
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 {
            return delay;
        }

        // Uniform factor in [1 - jitter, 1 + jitter]
        let factor = 1.0 - jitter + 2.0 * jitter * fastrand::f64();
        let jittered = delay.mul_f64(factor);
        jittered.min(self.max_delay)
    }
}

/// How one attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Retryable,
    Terminal,
}

impl AttemptOutcome {
    pub fn of<T>(result: &Result<T, FetchError>) -> Self {
        match result {
            Ok(_) => AttemptOutcome::Success,
            Err(e) if e.is_retryable() => AttemptOutcome::Retryable,
            Err(_) => AttemptOutcome::Terminal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Attempt `n` (1-based) is in flight
    Attempting(u32),
    /// Waiting `delay` before attempt `next`
    Retrying { next: u32, delay: Duration },
    Succeeded { attempts: u32 },
    Failed { attempts: u32 },
}

impl RetryState {
    pub fn start() -> Self {
        RetryState::Attempting(1)
    }

    /// Advance the machine. Only `Attempting` consumes an outcome;
    /// `Retrying` moves on to its next attempt and final states stay put.
    pub fn next(self, outcome: AttemptOutcome, policy: &RetryPolicy) -> Self {
        match self {
            RetryState::Attempting(n) => match outcome {
                AttemptOutcome::Success => RetryState::Succeeded { attempts: n },
                AttemptOutcome::Terminal => RetryState::Failed { attempts: n },
                AttemptOutcome::Retryable if n >= policy.max_attempts.max(1) => {
                    RetryState::Failed { attempts: n }
                }
                AttemptOutcome::Retryable => RetryState::Retrying {
                    next: n + 1,
                    delay: policy.jittered_backoff(n),
                },
            },
            RetryState::Retrying { next, .. } => RetryState::Attempting(next),
            done => done,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, RetryState::Succeeded { .. } | RetryState::Failed { .. })
    }
}

/// A fetch result together with the number of attempts it took
#[derive(Debug)]
pub struct RetriedFetch {
    pub result: Result<Vec<TranscriptSegment>, FetchError>,
    pub attempts: u32,
}

/// Run `fetcher` under `policy`, sleeping between retryable failures
pub async fn fetch_with_retry(
    fetcher: &dyn TranscriptFetcher,
    video_id: &str,
    languages: &[String],
    policy: &RetryPolicy,
) -> RetriedFetch {
    let mut attempt = 1;

    loop {
        let result = fetcher.fetch(video_id, languages).await;

        match RetryState::Attempting(attempt).next(AttemptOutcome::of(&result), policy) {
            RetryState::Retrying { next, delay } => {
                if let Err(e) = &result {
                    tracing::warn!(
                        "Attempt {}/{} for {} failed ({}); retrying in {:.1}s",
                        attempt,
                        policy.max_attempts,
                        video_id,
                        e,
                        delay.as_secs_f64()
                    );
                }
                tokio::time::sleep(delay).await;
                attempt = next;
            }
            RetryState::Succeeded { attempts } | RetryState::Failed { attempts } => {
                return RetriedFetch { result, attempts };
            }
            RetryState::Attempting(next) => attempt = next,
        }
    }
}
