//! Immutable agent configuration.

use std::fmt;
use std::sync::Arc;

use bon::Builder;

use crate::context::WindowManager;
use crate::prompt::{DefaultPromptGenerator, PromptGenerator};
use crate::provider::ModelProvider;
use crate::resilience::Resilience;
use crate::tools::ToolRegistry;
use crate::validation::{JsonSchemaValidator, Validator};

/// Backend calls allowed per tool-calling run unless configured otherwise.
pub const DEFAULT_MAX_TOOL_ITERATIONS: u32 = 5;

pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Everything an agent needs besides its memory. Shared by every instance
/// derived from the same agent.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use tandem::agent::AgentConfig;
/// # fn client() -> Arc<dyn tandem::provider::ModelProvider> { unimplemented!() }
/// let config = AgentConfig::builder()
///     .client(client())
///     .model("claude-sonnet")
///     .system_prompt("You are terse.")
///     .max_tool_iterations(3)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AgentConfig {
    pub client: Arc<dyn ModelProvider>,
    #[builder(into)]
    pub model: String,
    #[builder(default = DEFAULT_TEMPERATURE)]
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    pub tool_registry: Option<Arc<dyn ToolRegistry>>,
    /// Upper bound on backend calls per tool-calling run.
    #[builder(default = DEFAULT_MAX_TOOL_ITERATIONS)]
    pub max_tool_iterations: u32,
    #[builder(default)]
    pub resilience: Resilience,
    /// Instructions handed to the prompt generator.
    #[builder(into)]
    pub system_prompt: Option<String>,
    #[builder(default = default_prompt_generator())]
    pub prompt_generator: Arc<dyn PromptGenerator>,
    pub input_schema: Option<serde_json::Value>,
    pub output_schema: Option<serde_json::Value>,
    #[builder(default = default_validator())]
    pub validator: Arc<dyn Validator>,
    /// Applied to memory before every backend call of a run.
    pub context_window: Option<WindowManager>,
    /// Retention bound for the memory of new instances.
    pub max_messages: Option<usize>,
}

fn default_prompt_generator() -> Arc<dyn PromptGenerator> {
    Arc::new(DefaultPromptGenerator)
}

fn default_validator() -> Arc<dyn Validator> {
    Arc::new(JsonSchemaValidator)
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("provider", &self.client.provider_name())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field(
                "tools",
                &self
                    .tool_registry
                    .as_ref()
                    .map(|registry| registry.definitions().len()),
            )
            .field("max_tool_iterations", &self.max_tool_iterations)
            .field("resilience", &self.resilience)
            .field("system_prompt", &self.system_prompt)
            .field("input_schema", &self.input_schema.is_some())
            .field("output_schema", &self.output_schema.is_some())
            .field("context_window", &self.context_window)
            .field("max_messages", &self.max_messages)
            .finish_non_exhaustive()
    }
}
