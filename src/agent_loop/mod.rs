//! The tool-calling loop, blocking and streaming.

mod runner;
mod streaming;
pub(crate) mod tooling;
pub mod types;

pub use runner::{run, run_with_tools};
pub use streaming::{stream_response, stream_with_tools};
pub use types::{AgentInput, AgentResponse};
