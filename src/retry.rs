// 🔁 Retry Policy - Exponential backoff around a fallible async operation
//
// Retry n waits base × 2^(n−1): 1s, 2s, 4s with the defaults. Once the
// retries are used up the state stays exhausted until someone resets it
// (a successful run, or an explicit manual retry).

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Automatic retries after the first failure
    pub max_retries: u32,

    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based), or `None` past the limit.
    pub fn delay_for(&self, retry: u32) -> Option<Duration> {
        if retry == 0 || retry > self.max_retries {
            return None;
        }
        let factor = 2u32.checked_pow(retry - 1)?;
        self.base_delay.checked_mul(factor)
    }
}

/// Retry bookkeeping for one logical operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    retries: u32,
    exhausted: bool,
}

impl RetryState {
    /// Retries already spent
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// True once the policy gave up; no automatic retry happens until reset.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn reset(&mut self) {
        *self = RetryState::default();
    }
}

/// Run `op`, sleeping and retrying per `policy` while it fails.
///
/// Returns the last error when the policy gives up. An exhausted `state`
/// makes this a single attempt.
pub async fn retry_with<T, E, F, Fut>(
    policy: &RetryPolicy,
    state: &mut RetryState,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    loop {
        match op().await {
            Ok(value) => {
                if state.retries > 0 {
                    info!(retries = state.retries, "operation succeeded after retrying");
                }
                state.reset();
                return Ok(value);
            }
            Err(err) => {
                let next = state.retries + 1;
                match policy.delay_for(next).filter(|_| !state.exhausted) {
                    Some(delay) => {
                        warn!(
                            retry = next,
                            max = policy.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            "attempt failed: {}",
                            err
                        );
                        state.retries = next;
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        warn!(retries = state.retries, "giving up: {}", err);
                        state.exhausted = true;
                        return Err(err);
                    }
                }
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tokio::time::Instant;

    #[test]
    fn test_default_delays() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_for(0), None);
        assert_eq!(policy.delay_for(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_secs(4)));
        assert_eq!(policy.delay_for(4), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let policy = RetryPolicy::default();
        let mut state = RetryState::default();
        let calls = Cell::new(0);
        let started = Instant::now();

        let result: Result<(), String> = retry_with(&policy, &mut state, || {
            calls.set(calls.get() + 1);
            async { Err("offline".to_string()) }
        })
        .await;

        assert_eq!(result, Err("offline".to_string()));
        assert_eq!(calls.get(), 4, "first attempt plus three retries");
        assert!(state.is_exhausted());
        assert_eq!(state.retries(), 3);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(7) && waited < Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_state_does_not_retry_again() {
        let policy = RetryPolicy::default();
        let mut state = RetryState::default();

        let _: Result<(), String> =
            retry_with(&policy, &mut state, || async { Err("down".to_string()) }).await;
        assert!(state.is_exhausted());

        let calls = Cell::new(0);
        let result: Result<(), String> = retry_with(&policy, &mut state, || {
            calls.set(calls.get() + 1);
            async { Err("still down".to_string()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);

        state.reset();
        assert!(!state.is_exhausted());
        assert_eq!(state.retries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_state() {
        let policy = RetryPolicy::default();
        let mut state = RetryState::default();
        let calls = Cell::new(0);

        let result: Result<u32, String> = retry_with(&policy, &mut state, || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 {
                    Err(format!("failure {}", n))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(state, RetryState::default());
    }
}
