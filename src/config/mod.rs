//! Runtime configuration (layered: defaults < TOML file < environment).
//!
//! ```toml
//! [agent]
//! model = "claude-sonnet"
//! max_tool_iterations = 8
//! exhaustion = "propagate"
//!
//! [retry]
//! max_attempts = 4
//! base_delay_ms = 250
//!
//! [circuit_breaker]
//! enabled = true
//! failure_threshold = 3
//!
//! [window]
//! max_tokens = 8000
//! reserved_tokens = 1000
//! strategy = "summarize"
//!
//! [pool]
//! size = 8
//! max_overflow = 2
//! ```

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agent::{AgentConfig, DEFAULT_MAX_TOOL_ITERATIONS, DEFAULT_TEMPERATURE};
use crate::context::WindowManager;
use crate::error::{Result, TandemError};
use crate::pool::{CheckoutMode, PoolConfig};
use crate::provider::ModelProvider;
use crate::resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerHandle, ExhaustionPolicy, Resilience,
};
use crate::util::retry::RetryPolicy;

/// Environment variable naming a TOML file loaded by [`TandemConfig::from_env`].
pub const CONFIG_PATH_ENV: &str = "TANDEM_CONFIG";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TandemConfig {
    pub agent: AgentSection,
    pub retry: RetrySection,
    pub circuit_breaker: CircuitBreakerSection,
    /// No window management when absent.
    pub window: Option<WindowManager>,
    pub pool: PoolSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub model: Option<String>,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    pub max_tool_iterations: u32,
    pub max_messages: Option<usize>,
    pub system_prompt: Option<String>,
    pub call_timeout_ms: Option<u64>,
    pub exhaustion: ExhaustionPolicy,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
            max_messages: None,
            system_prompt: None,
            call_timeout_ms: None,
            exhaustion: ExhaustionPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub enabled: bool,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetrySection {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            enabled: true,
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            multiplier: policy.multiplier,
            jitter: policy.jitter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSection {
    pub enabled: bool,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout_ms: u64,
}

impl Default for CircuitBreakerSection {
    fn default() -> Self {
        let config = CircuitBreakerConfig::default();
        Self {
            enabled: false,
            failure_threshold: config.failure_threshold,
            success_threshold: config.success_threshold,
            timeout_ms: config.timeout.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSection {
    pub size: usize,
    pub max_overflow: usize,
    /// Blocking checkout timeout; `0` makes checkouts non-blocking.
    pub checkout_timeout_ms: u64,
}

impl Default for PoolSection {
    fn default() -> Self {
        let pool = PoolConfig::default();
        Self {
            size: pool.size,
            max_overflow: pool.max_overflow,
            checkout_timeout_ms: 5_000,
        }
    }
}

impl TandemConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| TandemError::Configuration(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Load `.env` if present, start from the file named by `TANDEM_CONFIG`
    /// (or defaults) and apply `TANDEM_*` overrides.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `TANDEM_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("TANDEM_MODEL") {
            self.agent.model = Some(model);
        }
        if let Some(prompt) = lookup("TANDEM_SYSTEM_PROMPT") {
            self.agent.system_prompt = Some(prompt);
        }
        override_parsed(&lookup, "TANDEM_TEMPERATURE", &mut self.agent.temperature)?;
        override_optional(&lookup, "TANDEM_MAX_TOKENS", &mut self.agent.max_tokens)?;
        override_parsed(
            &lookup,
            "TANDEM_MAX_TOOL_ITERATIONS",
            &mut self.agent.max_tool_iterations,
        )?;
        override_optional(&lookup, "TANDEM_MAX_MESSAGES", &mut self.agent.max_messages)?;
        override_optional(&lookup, "TANDEM_CALL_TIMEOUT_MS", &mut self.agent.call_timeout_ms)?;
        override_parsed(&lookup, "TANDEM_EXHAUSTION", &mut self.agent.exhaustion)?;
        override_parsed(&lookup, "TANDEM_RETRY_ENABLED", &mut self.retry.enabled)?;
        override_parsed(&lookup, "TANDEM_RETRY_MAX_ATTEMPTS", &mut self.retry.max_attempts)?;
        override_parsed(&lookup, "TANDEM_RETRY_BASE_DELAY_MS", &mut self.retry.base_delay_ms)?;
        override_parsed(
            &lookup,
            "TANDEM_CIRCUIT_BREAKER_ENABLED",
            &mut self.circuit_breaker.enabled,
        )?;
        override_parsed(&lookup, "TANDEM_POOL_SIZE", &mut self.pool.size)?;
        override_parsed(&lookup, "TANDEM_POOL_MAX_OVERFLOW", &mut self.pool.max_overflow)?;
        Ok(())
    }

    pub fn retry_policy(&self) -> Option<RetryPolicy> {
        if !self.retry.enabled {
            return None;
        }
        let mut policy = RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.base_delay_ms),
        )
        .with_max_delay(Duration::from_millis(self.retry.max_delay_ms))
        .with_multiplier(self.retry.multiplier);
        if !self.retry.jitter {
            policy = policy.without_jitter();
        }
        Some(policy)
    }

    /// A fresh breaker; share the handle between agents that call the same backend.
    pub fn circuit_breaker(&self) -> Option<CircuitBreakerHandle> {
        self.circuit_breaker.enabled.then(|| {
            CircuitBreaker::shared(CircuitBreakerConfig {
                failure_threshold: self.circuit_breaker.failure_threshold,
                success_threshold: self.circuit_breaker.success_threshold,
                timeout: Duration::from_millis(self.circuit_breaker.timeout_ms),
            })
        })
    }

    pub fn resilience(&self) -> Resilience {
        let mut resilience = Resilience::new().with_exhaustion_policy(self.agent.exhaustion);
        if let Some(policy) = self.retry_policy() {
            resilience = resilience.with_retry(policy);
        }
        if let Some(breaker) = self.circuit_breaker() {
            resilience = resilience.with_circuit_breaker(breaker);
        }
        if let Some(ms) = self.agent.call_timeout_ms {
            resilience = resilience.with_call_timeout(Duration::from_millis(ms));
        }
        resilience
    }

    pub fn window_manager(&self) -> Option<WindowManager> {
        self.window
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            size: self.pool.size,
            max_overflow: self.pool.max_overflow,
        }
    }

    pub fn checkout_mode(&self) -> CheckoutMode {
        match self.pool.checkout_timeout_ms {
            0 => CheckoutMode::NonBlocking,
            ms => CheckoutMode::Blocking {
                timeout: Duration::from_millis(ms),
            },
        }
    }

    /// Agent configuration for `client`. Requires `agent.model`.
    pub fn agent_config(&self, client: Arc<dyn ModelProvider>) -> Result<AgentConfig> {
        let model = self.agent.model.clone().ok_or_else(|| {
            TandemError::Configuration("agent.model is not set".to_string())
        })?;
        Ok(AgentConfig::builder()
            .client(client)
            .model(model)
            .temperature(self.agent.temperature)
            .maybe_max_tokens(self.agent.max_tokens)
            .max_tool_iterations(self.agent.max_tool_iterations)
            .resilience(self.resilience())
            .maybe_system_prompt(self.agent.system_prompt.clone())
            .maybe_context_window(self.window)
            .maybe_max_messages(self.agent.max_messages)
            .build())
    }
}

fn override_parsed<T, F>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| TandemError::Configuration(format!("{key}={raw}: {e}")))?;
    }
    Ok(())
}

fn override_optional<T, F>(lookup: &F, key: &str, target: &mut Option<T>) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        let parsed = raw
            .trim()
            .parse()
            .map_err(|e| TandemError::Configuration(format!("{key}={raw}: {e}")))?;
        *target = Some(parsed);
    }
    Ok(())
}
