//! Resilience wrapper around a single fallible backend call.
//!
//! Composition, innermost first: per-call timeout, retry, circuit breaker.
//! The breaker sees one outcome per wrapped call, after retries.

pub mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerHandle, CircuitState};

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::warn;

use crate::error::{Result, TandemError};
use crate::util::retry::RetryPolicy;
use crate::util::timeout::maybe_with_timeout;

/// What a degrading call returns once resilience is exhausted.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Substitute the caller's degraded default value.
    #[default]
    Degrade,
    /// Surface the terminal error.
    Propagate,
}

/// Retry, circuit breaking and timeout settings for backend calls.
#[derive(Debug, Clone, Default)]
pub struct Resilience {
    retry: Option<RetryPolicy>,
    circuit_breaker: Option<CircuitBreakerHandle>,
    call_timeout: Option<Duration>,
    exhaustion: ExhaustionPolicy,
}

impl Resilience {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn with_circuit_breaker(mut self, breaker: CircuitBreakerHandle) -> Self {
        self.circuit_breaker = Some(breaker);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn with_exhaustion_policy(mut self, policy: ExhaustionPolicy) -> Self {
        self.exhaustion = policy;
        self
    }

    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }

    pub fn circuit_breaker(&self) -> Option<&CircuitBreakerHandle> {
        self.circuit_breaker.as_ref()
    }

    pub fn exhaustion_policy(&self) -> ExhaustionPolicy {
        self.exhaustion
    }

    /// Run `operation` with every configured policy and surface any error.
    pub async fn call<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(breaker) = &self.circuit_breaker {
            breaker.try_acquire()?;
        }

        let timeout = self.call_timeout;
        let outcome = match &self.retry {
            Some(policy) => {
                policy
                    .execute(|| maybe_with_timeout(timeout, operation()))
                    .await
            }
            None => maybe_with_timeout(timeout, operation()).await,
        };

        if let Some(breaker) = &self.circuit_breaker {
            match &outcome {
                Ok(_) => breaker.record_success(),
                Err(_) => breaker.record_failure(),
            }
        }
        outcome
    }

    /// Like [`Resilience::call`], but a terminal failure yields `degraded()`
    /// under [`ExhaustionPolicy::Degrade`].
    ///
    /// Terminal means the circuit rejected the call or the retry policy
    /// would have retried the final error had attempts remained. Errors the
    /// retry policy refuses always propagate.
    pub async fn call_or_degrade<F, Fut, T, D>(&self, operation: F, degraded: D) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        D: FnOnce() -> T,
    {
        match self.call(operation).await {
            Ok(value) => Ok(value),
            Err(err) if self.exhaustion == ExhaustionPolicy::Degrade && self.is_terminal(&err) => {
                warn!(error = %err, "Backend call exhausted resilience; returning degraded value");
                Ok(degraded())
            }
            Err(err) => Err(err),
        }
    }

    fn is_terminal(&self, error: &TandemError) -> bool {
        matches!(error, TandemError::CircuitOpen)
            || self
                .retry
                .as_ref()
                .is_some_and(|policy| policy.should_retry(error))
    }
}
