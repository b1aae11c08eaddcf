//! Bounded polling.

use std::future::Future;
use std::time::Duration;

use crate::config::PaymentConfig;

/// How long to keep re-querying something that has not settled yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Queries issued before giving up.
    pub max_attempts: u32,
    /// Delay before each query.
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval: Duration::from_secs(2),
        }
    }
}

/// How a poll ended.
#[derive(Debug)]
pub enum PollOutcome<T, E> {
    /// A query returned a terminal value.
    Settled { value: T, attempts: u32 },
    /// Every allowed query returned a non-terminal value. `attempt` is the
    /// first attempt beyond the ceiling.
    TimedOut { attempt: u32 },
    /// A query failed.
    Failed { error: E, attempts: u32 },
}

impl RetryPolicy {
    /// A policy with explicit bounds.
    #[must_use]
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// The payment status polling policy from configuration.
    #[must_use]
    pub const fn from_config(config: &PaymentConfig) -> Self {
        Self::new(config.poll_max_attempts, config.poll_interval)
    }

    /// Query until `is_terminal` accepts a value or the attempts run out.
    ///
    /// Each attempt waits `interval`, then calls `query` with its 1-based
    /// attempt number. Reaching attempt `max_attempts + 1` ends the poll
    /// without a further query.
    pub async fn poll<T, E, F, Fut>(
        &self,
        is_terminal: impl Fn(&T) -> bool,
        mut query: F,
    ) -> PollOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            if attempt > self.max_attempts {
                return PollOutcome::TimedOut { attempt };
            }

            tokio::time::sleep(self.interval).await;

            match query(attempt).await {
                Ok(value) if is_terminal(&value) => {
                    return PollOutcome::Settled {
                        value,
                        attempts: attempt,
                    };
                }
                Ok(_) => tracing::debug!(attempt, "Still not settled"),
                Err(error) => {
                    return PollOutcome::Failed {
                        error,
                        attempts: attempt,
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn instant(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO)
    }

    #[test]
    fn test_default_policy_is_thirty_times_two_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 30);
        assert_eq!(policy.interval, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_settles_on_last_allowed_attempt() {
        let calls = Cell::new(0);
        let outcome = instant(30)
            .poll(
                |done: &bool| *done,
                |attempt| {
                    calls.set(calls.get() + 1);
                    async move { Ok::<_, ()>(attempt == 30) }
                },
            )
            .await;

        assert!(matches!(outcome, PollOutcome::Settled { attempts: 30, .. }));
        assert_eq!(calls.get(), 30);
    }

    #[tokio::test]
    async fn test_times_out_beyond_ceiling() {
        let calls = Cell::new(0);
        let outcome = instant(30)
            .poll(
                |done: &bool| *done,
                |_| {
                    calls.set(calls.get() + 1);
                    async { Ok::<_, ()>(false) }
                },
            )
            .await;

        assert!(matches!(outcome, PollOutcome::TimedOut { attempt: 31 }));
        assert_eq!(calls.get(), 30);
    }

    #[tokio::test]
    async fn test_query_error_stops_polling() {
        let outcome = instant(5)
            .poll(
                |_: &bool| false,
                |attempt| async move { if attempt == 2 { Err("down") } else { Ok(false) } },
            )
            .await;

        assert!(matches!(
            outcome,
            PollOutcome::Failed {
                error: "down",
                attempts: 2
            }
        ));
    }
}
