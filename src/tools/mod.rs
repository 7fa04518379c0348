//! Tool system for function calling.

pub mod arguments;
pub mod registry;
pub mod tool;
pub mod types;

pub use arguments::ToolArguments;
pub use registry::{InMemoryToolRegistry, ToolRegistry};
pub use tool::{AgentTool, Tool, ToolExecutionContext};
pub use types::{ParameterBuilder, ToolDefinition, ToolParameters};
