//! Convenience re-exports for common use.

pub use crate::agent::{Agent, AgentConfig};
pub use crate::agent_loop::{AgentInput, AgentResponse};
pub use crate::config::TandemConfig;
pub use crate::context::{TruncationStrategy, WindowManager};
pub use crate::error::{Result, TandemError};
pub use crate::memory::ConversationMemory;
pub use crate::pool::{AgentPool, CheckoutMode, PoolConfig, PooledAgent};
pub use crate::provider::{ConverseRequest, ModelProvider};
pub use crate::resilience::{CircuitBreaker, CircuitBreakerConfig, ExhaustionPolicy, Resilience};
pub use crate::stream::{StreamCallback, StreamSignal};
pub use crate::tools::{AgentTool, InMemoryToolRegistry, Tool, ToolArguments, ToolParameters};
pub use crate::types::{ContentBlock, MessageContent, ModelResponse, Role, Usage};
pub use crate::util::retry::RetryPolicy;
