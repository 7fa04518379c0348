//! Model backend interface.
//!
//! Wire protocols (request encoding, authentication, transport) live in
//! implementations of [`ModelProvider`]; the runtime only sees structured
//! requests, responses and stream events.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::TandemError;
use crate::types::{Message, ModelResponse, ResponseShape, StreamEvent};

pub use crate::tools::ToolDefinition;

/// A request sent to a model backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ConverseRequest {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    /// Leading system message, if any.
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub response_shape: ResponseShape,
    pub tools: Option<Vec<ToolDefinition>>,
}

/// Stream of protocol events produced by [`ModelProvider::stream_converse`].
pub type EventStream = BoxStream<'static, Result<StreamEvent, TandemError>>;

/// Core trait implemented by all model backends.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "anthropic"), used in logs.
    fn provider_name(&self) -> &str;

    /// One blocking conversation turn.
    async fn converse(&self, request: &ConverseRequest) -> Result<ModelResponse, TandemError>;

    /// One streamed conversation turn.
    async fn stream_converse(&self, request: &ConverseRequest) -> Result<EventStream, TandemError>;
}
