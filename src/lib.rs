//! Tandem: an execution runtime for tool-calling LLM agents.
//!
//! Provides turn-scoped conversation memory, a resilient tool-calling loop
//! (blocking and streaming), a streaming event reducer, context window
//! management and a pool of reusable agents. Model backends plug in through
//! [`provider::ModelProvider`].
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tandem::prelude::*;
//!
//! # async fn example(client: Arc<dyn ModelProvider>) -> tandem::error::Result<()> {
//! let agent = Agent::new(
//!     AgentConfig::builder()
//!         .client(client)
//!         .model("claude-sonnet")
//!         .system_prompt("Answer in one sentence.")
//!         .build(),
//! );
//! let (agent, reply) = agent.run_with_tools("What time is it?").await?;
//! println!("{} ({} messages remembered)", reply.text(), agent.memory().len());
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod agent_loop;
pub mod config;
pub mod context;
pub mod error;
pub mod memory;
pub mod pool;
pub mod prelude;
pub mod prompt;
pub mod provider;
pub mod resilience;
pub mod stream;
pub mod tools;
pub mod types;
pub mod util;
pub mod validation;
