// ── Retry policy ──
//
// Bounded exponential backoff shared by roster fetches and endpoint
// deliveries. Each attempt runs under its own timeout; a timeout counts
// as that attempt's failure.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::CoreError;

/// Exponential backoff configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Clamped to at least 1.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Relative jitter in `[0, 1)`; `0.25` spreads delays by ±25%.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: 0.25,
        }
    }
}

/// Result of running an operation under a [`RetryPolicy`].
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Succeeded { value: T, attempts: u32 },
    Exhausted { error: CoreError, attempts: u32 },
}

impl<T> RetryOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn into_result(self) -> Result<T, CoreError> {
        match self {
            Self::Succeeded { value, .. } => Ok(value),
            Self::Exhausted { error, .. } => Err(error),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff before attempt `attempt + 1`, where `attempt` is the
    /// 0-based index of the attempt that just failed.
    ///
    /// `delay = min(base * 2^attempt, max) * (1 ± jitter)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX).min(30);
        let base = self.base_delay.as_secs_f64() * 2.0_f64.powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());

        // Deterministic jitter seeded from the attempt number.
        let jitter = self.jitter.clamp(0.0, 0.99);
        let factor = 1.0 + jitter * (f64::from(attempt) * 7.3).sin();
        Duration::from_secs_f64((capped * factor).max(0.0))
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `operation` names the call in logs and timeout errors.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        timeout: Duration,
        mut op: F,
    ) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            let result = match tokio::time::timeout(timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(CoreError::Timeout { operation, timeout }),
            };
            attempt += 1;

            let error = match result {
                Ok(value) => {
                    return RetryOutcome::Succeeded {
                        value,
                        attempts: attempt,
                    };
                }
                Err(error) => error,
            };

            if attempt >= max_attempts || !error.is_retryable() {
                return RetryOutcome::Exhausted {
                    error,
                    attempts: attempt,
                };
            }

            let delay = self.delay_for(attempt - 1);
            debug!(
                operation,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "attempt failed, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
