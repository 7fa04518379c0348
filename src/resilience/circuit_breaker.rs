//! Three-state circuit breaker (Closed, Open, HalfOpen).
//!
//! - **Closed**: calls flow; `failure_threshold` consecutive failures open
//!   the circuit.
//! - **Open**: calls are rejected with [`TandemError::CircuitOpen`] until
//!   `timeout` has elapsed since the circuit opened.
//! - **HalfOpen**: calls flow as trial calls; `success_threshold` consecutive
//!   successes close the circuit, any failure re-opens it and restarts the
//!   timer.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::Display;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::{Result, TandemError};

/// Shared handle; one breaker usually guards one backend for many agents.
pub type CircuitBreakerHandle = Arc<CircuitBreaker>;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    /// How long the circuit stays open before admitting trial calls.
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    opened_at: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                opened_at: None,
            }),
        }
    }

    /// Create a shareable handle.
    pub fn shared(config: CircuitBreakerConfig) -> CircuitBreakerHandle {
        Arc::new(Self::new(config))
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current state, moving Open to HalfOpen once the timeout has elapsed.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        inner.state
    }

    fn refresh(&self, inner: &mut BreakerState) {
        if inner.state != CircuitState::Open {
            return;
        }
        let elapsed = inner
            .opened_at
            .map(|opened| opened.elapsed() >= self.config.timeout)
            .unwrap_or(true);
        if elapsed {
            inner.state = CircuitState::HalfOpen;
            inner.half_open_successes = 0;
            info!("Circuit breaker half-open: admitting trial calls");
        }
    }

    /// Admit a call or reject it while the circuit is open.
    pub fn try_acquire(&self) -> Result<()> {
        match self.state() {
            CircuitState::Open => Err(TandemError::CircuitOpen),
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        match inner.state {
            CircuitState::Closed => inner.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.half_open_successes = 0;
                    inner.opened_at = None;
                    info!("Circuit breaker closed: backend recovered");
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    Self::open(&mut inner);
                    warn!(
                        threshold = self.config.failure_threshold,
                        "Circuit breaker opened: backend marked unhealthy"
                    );
                }
            }
            CircuitState::HalfOpen => {
                Self::open(&mut inner);
                warn!("Circuit breaker re-opened: trial call failed");
            }
            CircuitState::Open => inner.opened_at = Some(Instant::now()),
        }
    }

    fn open(inner: &mut BreakerState) {
        inner.state = CircuitState::Open;
        inner.half_open_successes = 0;
        inner.opened_at = Some(Instant::now());
    }

    /// Run `operation` under the breaker, recording its outcome.
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.try_acquire()?;
        let outcome = operation().await;
        match &outcome {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }
        outcome
    }
}
