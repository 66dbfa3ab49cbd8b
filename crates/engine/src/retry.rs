//! Retry policy for task states.
//!
//! A failed attempt is retried only when the adapter reports it as
//! [`AdapterError::Retryable`]. Before retry `n` (1-based) the run sleeps for
//! a delay drawn uniformly from `[0, interval * backoff_rate^(n-1)]` when full
//! jitter is on, or exactly that ceiling when it is off.

use std::future::Future;
use std::time::Duration;

use adapters::AdapterError;
use rand::Rng;
use tracing::warn;

use crate::{machine::State, EngineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jitter {
    None,
    Full,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = 1 + `max_retries`.
    pub max_retries: u32,
    pub interval: Duration,
    pub backoff_rate: f64,
    pub jitter: Jitter,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            interval: Duration::from_secs(2),
            backoff_rate: 2.0,
            jitter: Jitter::Full,
        }
    }
}

impl RetryPolicy {
    /// Upper bound of the sleep before retry number `retry` (1-based).
    pub fn delay_ceiling(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        self.interval.mul_f64(self.backoff_rate.powi(exponent))
    }

    pub fn delay(&self, retry: u32) -> Duration {
        let ceiling = self.delay_ceiling(retry);
        match self.jitter {
            Jitter::None => ceiling,
            Jitter::Full => {
                let secs = rand::rng().random_range(0.0..=ceiling.as_secs_f64());
                Duration::from_secs_f64(secs)
            }
        }
    }

    /// Run `op` until it succeeds, fails fatally, or runs out of retries.
    pub async fn run<T, F, Fut>(&self, state: State, mut op: F) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AdapterError>>,
    {
        let mut retries = 0u32;

        loop {
            match op().await {
                Ok(value) => return Ok(value),

                Err(source @ AdapterError::Fatal(_)) => {
                    return Err(EngineError::StateFatal { state, source });
                }

                Err(source @ AdapterError::Retryable(_)) => {
                    if retries >= self.max_retries {
                        return Err(EngineError::RetryExhausted {
                            state,
                            attempts: retries + 1,
                            source,
                        });
                    }
                    retries += 1;

                    let delay = self.delay(retries);
                    warn!(
                        "state '{}' retryable error (retry {}/{}), retrying in {:?}: {}",
                        state, retries, self.max_retries, delay, source
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Run `op` exactly once; used by states without a retry policy.
pub async fn run_once<T, Fut>(state: State, op: Fut) -> Result<T, EngineError>
where
    Fut: Future<Output = Result<T, AdapterError>>,
{
    op.await
        .map_err(|source| EngineError::StateFailed { state, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn ceilings_grow_exponentially_from_the_interval() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_ceiling(1), Duration::from_secs(2));
        assert_eq!(policy.delay_ceiling(2), Duration::from_secs(4));
        assert_eq!(policy.delay_ceiling(3), Duration::from_secs(8));
    }

    #[test]
    fn full_jitter_stays_within_ceiling() {
        let policy = RetryPolicy::default();
        for retry in 1..=3 {
            for _ in 0..100 {
                assert!(policy.delay(retry) <= policy.delay_ceiling(retry));
            }
        }
    }

    #[test]
    fn no_jitter_uses_ceiling() {
        let policy = RetryPolicy {
            jitter: Jitter::None,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay(3), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_one_plus_max_retries_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = RetryPolicy::default()
            .run(State::FetchWeather, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(AdapterError::retryable("503"))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(matches!(
            result,
            Err(EngineError::RetryExhausted { attempts: 4, state: State::FetchWeather, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_the_full_backoff_without_jitter() {
        let policy = RetryPolicy {
            jitter: Jitter::None,
            ..RetryPolicy::default()
        };
        let started = tokio::time::Instant::now();
        let _ = policy
            .run(State::UpdateSite, || async {
                Err::<(), _>(AdapterError::retryable("slow down"))
            })
            .await;

        // 2s + 4s + 8s between the four attempts.
        assert_eq!(started.elapsed(), Duration::from_secs(14));
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = RetryPolicy::default()
            .run(State::FetchWeather, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(AdapterError::fatal("No weather data found"))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(EngineError::StateFatal { .. })));
    }
}
