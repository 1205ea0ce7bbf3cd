//! Shared resilience layer around adapter fetches: rate limiting, retry
//! with exponential backoff and jitter, and a total-wait ceiling.
//!
//! Transient errors are retried here and never surface past this module.
//! Running out of attempts (or exceeding the wait ceiling) yields the
//! terminal `SourceExhausted` for that (condition, source) pair; the
//! pipeline records it and carries on with the remaining pairs.

use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use medrecon_common::entities::{Condition, SourceType};
use medrecon_common::error::SourceError;

/// Enforces a minimum inter-call spacing derived from a per-source
/// requests-per-minute budget. Shared by all calls against one source.
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl RateLimiter {
    pub fn per_minute(rpm: u32) -> Self {
        let interval = Duration::from_secs_f64(60.0 / rpm.max(1) as f64);
        Self {
            interval,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Wait until the next request slot is free. Returns the wait applied.
    pub async fn acquire(&self) -> Duration {
        let wait = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let wait = next.saturating_duration_since(now);
            *next = std::cmp::max(*next, now) + self.interval;
            wait
        };
        if !wait.is_zero() {
            sleep(wait).await;
        }
        wait
    }

    /// Push the next slot out by one extra interval after an explicit
    /// throttling signal from the source.
    pub async fn penalize(&self) {
        let mut next = self.next_slot.lock().await;
        *next = std::cmp::max(*next, Instant::now()) + self.interval;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Retry policy for one wrapped fetch.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Ceiling on total time spent inside one wrapped fetch, including
    /// backoff and rate-limit waits.
    pub max_total_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            max_total_wait: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }
}

/// Wrap one (condition, source) fetch with rate limiting and retry/backoff.
///
/// Every failure mode collapses into `SourceExhausted` so the caller only
/// ever sees success or a terminal, recordable outcome for the pair.
pub async fn fetch_with_resilience<F, Fut, T>(
    policy: &RetryPolicy,
    limiter: &RateLimiter,
    condition: &Condition,
    source: SourceType,
    mut f: F,
) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, SourceError>>,
{
    let started = Instant::now();
    let mut backoff = policy.initial_backoff;
    let max_attempts = policy.max_attempts.max(1);

    let exhausted = |reason: String| SourceError::SourceExhausted {
        condition: condition.name().to_string(),
        source_name: source.as_str().to_string(),
        reason,
    };

    for attempt in 1..=max_attempts {
        // A slow per-source budget can dwarf the backoff; bound the
        // acquire wait by the same ceiling before queueing for a slot
        if attempt > 1 && started.elapsed() + limiter.interval() > policy.max_total_wait {
            warn!(
                source = %source,
                condition = %condition,
                attempt,
                "wait ceiling exceeded before next slot, giving up"
            );
            return Err(exhausted(format!(
                "max wait exceeded before attempt {}",
                attempt
            )));
        }

        limiter.acquire().await;

        match f().await {
            Ok(v) => {
                if attempt > 1 {
                    info!(
                        source = %source,
                        condition = %condition,
                        attempts = attempt,
                        "fetch succeeded after retries"
                    );
                }
                return Ok(v);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                if matches!(e, SourceError::SourceRateLimited { .. }) {
                    limiter.penalize().await;
                }

                let half = (backoff.as_millis() as u64) / 2;
                let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=half));
                let delay = backoff + jitter;

                if started.elapsed() + delay > policy.max_total_wait {
                    warn!(
                        source = %source,
                        condition = %condition,
                        attempt,
                        "wait ceiling exceeded, giving up"
                    );
                    return Err(exhausted(format!(
                        "max wait exceeded after {} attempts: {}",
                        attempt, e
                    )));
                }

                warn!(
                    source = %source,
                    condition = %condition,
                    attempt,
                    max_attempts,
                    backoff_ms = delay.as_millis() as u64,
                    error = %e,
                    "fetch failed, retrying"
                );
                sleep(delay).await;
                backoff = std::cmp::min(backoff * 2, policy.max_backoff);
            }
            Err(e) => {
                warn!(
                    source = %source,
                    condition = %condition,
                    attempt,
                    error = %e,
                    "fetch failed terminally"
                );
                return Err(exhausted(e.to_string()));
            }
        }
    }

    Err(exhausted(format!(
        "retry budget exhausted after {} attempts",
        max_attempts
    )))
}
