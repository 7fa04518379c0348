//! Retry with exponential backoff and jitter.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::TandemError;

/// Decides whether a failed attempt should be retried.
pub type RetryPredicate = Arc<dyn Fn(&TandemError) -> bool + Send + Sync>;

/// Retry policy configuration.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
    /// Randomize each delay to 75%–125% of its nominal value.
    pub jitter: bool,
    retry_if: RetryPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
            retry_if: Arc::new(TandemError::is_retryable),
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("multiplier", &self.multiplier)
            .field("jitter", &self.jitter)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Self::default()
        }
    }

    /// Replace the predicate deciding which errors are retried.
    pub fn with_retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&TandemError) -> bool + Send + Sync + 'static,
    {
        self.retry_if = Arc::new(predicate);
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Whether `error` qualifies for another attempt under this policy.
    pub fn should_retry(&self, error: &TandemError) -> bool {
        (self.retry_if)(error)
    }

    /// Nominal delay before retry number `retry` (0-based), before jitter.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(retry as i32);
        let secs = (self.base_delay.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay)
    }

    /// Execute an async operation with retry.
    ///
    /// The operation always runs at least once.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, TandemError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TandemError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    if attempt >= max_attempts || !self.should_retry(&e) {
                        return Err(e);
                    }

                    let nominal = self.delay_for(attempt - 1);
                    let sleep_duration = if self.jitter {
                        // Jitter: 75% to 125% of backoff
                        let jitter_factor = 0.75 + (rand_factor() * 0.5);
                        Duration::try_from_secs_f64(nominal.as_secs_f64() * jitter_factor)
                            .unwrap_or(nominal)
                    } else {
                        nominal
                    };

                    tracing::warn!(
                        attempt,
                        max_attempts,
                        delay_ms = sleep_duration.as_millis() as u64,
                        error = %e,
                        "Retrying after error"
                    );

                    tokio::time::sleep(sleep_duration).await;
                }
            }
        }
    }
}

/// Simple pseudo-random factor [0, 1) without pulling in rand crate.
fn rand_factor() -> f64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .hash(&mut hasher);
    std::thread::current().id().hash(&mut hasher);

    let hash = hasher.finish();
    (hash % 10000) as f64 / 10000.0
}
