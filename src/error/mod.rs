//! Error types for Tandem.

pub mod unified;

pub use unified::{ErrorCategory, FieldError, RecoverySuggestion};

use thiserror::Error;

/// Primary error type for all Tandem operations.
#[derive(Error, Debug)]
pub enum TandemError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Validation failed: {}", unified::join_field_errors(.0))]
    Validation(Vec<FieldError>),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Circuit breaker is open")]
    CircuitOpen,

    #[error("No agents available in pool")]
    NoAgentsAvailable,

    #[error("Timed out after {0}ms waiting for a pooled agent")]
    CheckoutTimeout(u64),

    #[error("Agent crashed: {0}")]
    AgentCrashed(String),

    #[error("Turn not found: {0}")]
    TurnNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl TandemError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
            source: None,
        }
    }

    /// Create a validation error with a single root-level failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new("", message)])
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(_) | Self::Stream(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::Validation(_) | Self::InvalidArgument(_) => ErrorCategory::Validation,
            Self::ToolNotFound(_) | Self::ToolExecution { .. } => ErrorCategory::ToolExecution,
            Self::CircuitOpen => ErrorCategory::Circuit,
            Self::NoAgentsAvailable | Self::CheckoutTimeout(_) | Self::AgentCrashed(_) => {
                ErrorCategory::Pool
            }
            Self::TurnNotFound(_) => ErrorCategory::Memory,
            Self::Io(_) | Self::InvalidState(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
        )
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::RateLimit => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Network => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Server => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::Validation => RecoverySuggestion::FixInput,
            ErrorCategory::ToolExecution => RecoverySuggestion::CheckToolImplementation,
            ErrorCategory::Circuit => RecoverySuggestion::WaitForCircuitReset,
            ErrorCategory::Pool => RecoverySuggestion::IncreasePoolCapacity,
            _ => RecoverySuggestion::ContactSupport,
        }
    }

    /// Field-level failures carried by a validation error.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Validation(errors) => errors,
            _ => &[],
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, TandemError>;
