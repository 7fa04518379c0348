//! Agents: immutable configuration plus conversation memory.

pub mod agent;
pub mod config;

pub use agent::Agent;
pub use config::{AgentConfig, DEFAULT_MAX_TOOL_ITERATIONS, DEFAULT_TEMPERATURE};
