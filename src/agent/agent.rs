//! Agent instances: a shared configuration paired with private memory.

use std::sync::Arc;

use crate::agent_loop::{self, AgentInput, AgentResponse};
use crate::context::{Summarizer, WindowManager};
use crate::error::Result;
use crate::memory::ConversationMemory;
use crate::stream::StreamCallback;

use super::config::AgentConfig;

/// An agent value.
///
/// Every operation borrows the agent and hands back a new value alongside
/// its result, so a failed run leaves the caller's agent exactly as it was.
#[derive(Debug, Clone)]
pub struct Agent {
    config: Arc<AgentConfig>,
    memory: ConversationMemory,
}

impl Agent {
    /// Create an agent with empty memory.
    pub fn new(config: AgentConfig) -> Self {
        Self::from_shared(Arc::new(config))
    }

    /// Create an agent with empty memory from an already shared config.
    pub fn from_shared(config: Arc<AgentConfig>) -> Self {
        let memory = ConversationMemory::new(config.max_messages);
        Self { config, memory }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn shared_config(&self) -> Arc<AgentConfig> {
        Arc::clone(&self.config)
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// The same agent with `memory` in place of its own.
    pub fn with_memory(&self, memory: ConversationMemory) -> Self {
        Self {
            config: Arc::clone(&self.config),
            memory,
        }
    }

    /// The same agent with an empty memory.
    pub fn reset(&self) -> Self {
        Self::from_shared(Arc::clone(&self.config))
    }

    /// One backend call without tools.
    pub async fn run(&self, input: impl Into<AgentInput>) -> Result<(Agent, AgentResponse)> {
        agent_loop::run(self, input.into()).await
    }

    /// Alternate backend calls and tool execution until the model answers
    /// without tool calls or the iteration budget runs out.
    pub async fn run_with_tools(
        &self,
        input: impl Into<AgentInput>,
    ) -> Result<(Agent, AgentResponse)> {
        agent_loop::run_with_tools(self, input.into()).await
    }

    /// Streaming variant of [`Agent::run`].
    pub async fn stream_response(
        &self,
        input: impl Into<AgentInput>,
        callback: Option<StreamCallback>,
    ) -> Result<(Agent, AgentResponse)> {
        agent_loop::stream_response(self, input.into(), callback).await
    }

    /// Streaming variant of [`Agent::run_with_tools`].
    pub async fn stream_with_tools(
        &self,
        input: impl Into<AgentInput>,
        callback: Option<StreamCallback>,
    ) -> Result<(Agent, AgentResponse)> {
        agent_loop::stream_with_tools(self, input.into(), callback).await
    }

    /// Summarizer bound to this agent's backend, model and resilience.
    pub fn summarizer(&self) -> Summarizer {
        Summarizer::new(Arc::clone(&self.config.client), self.config.model.clone())
            .with_resilience(self.config.resilience.clone())
    }

    /// The same agent with its memory brought under `window`.
    pub async fn fit_context(&self, window: &WindowManager) -> Result<Agent> {
        let summarizer = self.summarizer();
        let memory = window.truncate(&self.memory, Some(&summarizer)).await?;
        Ok(self.with_memory(memory))
    }
}
