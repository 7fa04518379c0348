//! Blocking and tool-calling runs.
//!
//! A run works on a copy of the agent's memory and only produces a new
//! agent once it has a final response, so any error leaves the caller's
//! agent untouched.

use tracing::{debug, info, warn};

use crate::agent::{Agent, AgentConfig};
use crate::error::{Result, TandemError};
use crate::memory::ConversationMemory;
use crate::provider::ConverseRequest;
use crate::stream::StreamCallback;
use crate::types::{MessageContent, ModelResponse, ResponseShape, Role, Usage};

use super::streaming::stream_backend_call;
use super::tooling::execute_tool_calls;
use super::types::{AgentInput, AgentResponse};

/// How backend calls of a run are made.
pub(crate) enum Transport {
    Blocking,
    Streaming(Option<StreamCallback>),
}

/// State of one run between backend calls.
pub(crate) struct LoopRun<'a> {
    agent: &'a Agent,
    memory: ConversationMemory,
    usage: Usage,
    backend_calls: u32,
    transport: Transport,
}

impl<'a> LoopRun<'a> {
    /// Validate `input` and record it as the first message of a new turn.
    pub(crate) fn start(agent: &'a Agent, input: AgentInput, transport: Transport) -> Result<Self> {
        let config = agent.config();
        if let (Some(schema), Some(value)) = (&config.input_schema, input.as_value()) {
            if let Err(errors) = config.validator.validate(schema, &value) {
                debug!(failures = errors.len(), "input rejected by contract");
                return Err(TandemError::Validation(errors));
            }
        }

        let mut memory = agent.memory().clone();
        if let Some(content) = input.into_content() {
            memory.end_turn();
            memory.add_message(Role::User, content);
        }

        Ok(Self {
            agent,
            memory,
            usage: Usage::default(),
            backend_calls: 0,
            transport,
        })
    }

    fn config(&self) -> &'a AgentConfig {
        self.agent.config()
    }

    fn request(&self, with_tools: bool) -> ConverseRequest {
        let config = self.config();
        let registry = config.tool_registry.as_deref();
        let tools = if with_tools {
            registry
                .map(|registry| registry.definitions())
                .filter(|definitions| !definitions.is_empty())
        } else {
            None
        };
        let response_shape = match (&config.output_schema, with_tools) {
            (_, true) => ResponseShape::TextOrToolCalls,
            (Some(schema), false) => ResponseShape::Json {
                schema: schema.clone(),
            },
            (None, false) => ResponseShape::Text,
        };

        ConverseRequest {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            system: config
                .prompt_generator
                .system_prompt(config.system_prompt.as_deref(), registry),
            messages: self.memory.messages().cloned().collect(),
            response_shape,
            tools,
        }
    }

    /// One resilient backend call, after fitting memory to the window.
    pub(crate) async fn call_backend(&mut self, with_tools: bool) -> Result<ModelResponse> {
        if let Some(window) = &self.config().context_window {
            let summarizer = self.agent.summarizer();
            self.memory = window.truncate(&self.memory, Some(&summarizer)).await?;
        }

        let request = self.request(with_tools);
        let resilience = &self.config().resilience;
        let client = &self.config().client;
        let response = match &self.transport {
            Transport::Blocking => {
                resilience
                    .call_or_degrade(|| client.converse(&request), ModelResponse::degraded)
                    .await?
            }
            Transport::Streaming(callback) => {
                stream_backend_call(resilience, client.as_ref(), &request, callback).await?
            }
        };

        self.backend_calls += 1;
        self.usage.merge(&response.usage);
        debug!(
            call = self.backend_calls,
            tool_calls = response.tool_calls().len(),
            degraded = response.degraded,
            "backend call completed"
        );
        Ok(response)
    }

    /// Record the assistant's tool-call message, run every call and record
    /// one tool message per result.
    pub(crate) async fn execute_tools(&mut self, response: &ModelResponse) {
        self.memory
            .add_message(Role::Assistant, MessageContent::Blocks(response.content.clone()));
        let calls = response.tool_calls();
        let results = execute_tool_calls(self.config().tool_registry.as_deref(), &calls).await;
        for result in results {
            self.memory.add_message(Role::Tool, result);
        }
    }

    /// Validate the output, record it and produce the new agent.
    pub(crate) fn finish(mut self, response: ModelResponse) -> (Agent, AgentResponse) {
        if response.degraded {
            warn!(
                backend_calls = self.backend_calls,
                "run finished with a degraded response"
            );
        } else {
            self.check_output(&response);
            let content = if response.has_tool_calls() {
                MessageContent::Blocks(response.content.clone())
            } else {
                MessageContent::Text(response.text())
            };
            self.memory.add_message(Role::Assistant, content);
        }

        let agent = self.agent.with_memory(self.memory);
        (
            agent,
            AgentResponse {
                response,
                usage: self.usage,
                iterations: self.backend_calls,
            },
        )
    }

    fn check_output(&self, response: &ModelResponse) {
        let config = self.config();
        let Some(schema) = &config.output_schema else {
            return;
        };
        let text = response.text();
        let value = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));
        if let Err(errors) = config.validator.validate(schema, &value) {
            for error in &errors {
                warn!(path = %error.path, message = %error.message, "output failed validation");
            }
        }
    }
}

/// One backend call without tools.
pub async fn run(agent: &Agent, input: AgentInput) -> Result<(Agent, AgentResponse)> {
    single_call(agent, input, Transport::Blocking).await
}

/// Tool-calling loop over blocking backend calls.
pub async fn run_with_tools(agent: &Agent, input: AgentInput) -> Result<(Agent, AgentResponse)> {
    tool_loop(agent, input, Transport::Blocking).await
}

pub(crate) async fn single_call(
    agent: &Agent,
    input: AgentInput,
    transport: Transport,
) -> Result<(Agent, AgentResponse)> {
    let mut run = LoopRun::start(agent, input, transport)?;
    let response = run.call_backend(false).await?;
    Ok(run.finish(response))
}

/// Alternate backend calls and tool execution.
///
/// `max_tool_iterations` bounds backend calls; the last call of the budget
/// is final even if it asks for more tools.
pub(crate) async fn tool_loop(
    agent: &Agent,
    input: AgentInput,
    transport: Transport,
) -> Result<(Agent, AgentResponse)> {
    let budget = agent.config().max_tool_iterations.max(1);
    let mut run = LoopRun::start(agent, input, transport)?;
    let mut remaining = budget;

    loop {
        let forced_final = remaining <= 1;
        let response = run.call_backend(true).await?;
        remaining -= 1;

        if !response.has_tool_calls() {
            return Ok(run.finish(response));
        }
        if forced_final {
            info!(
                budget,
                pending_tool_calls = response.tool_calls().len(),
                "tool iteration budget exhausted; returning last response"
            );
            return Ok(run.finish(response));
        }

        run.execute_tools(&response).await;
    }
}
