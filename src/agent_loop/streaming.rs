//! Streaming runs.
//!
//! Each backend call opens an event stream and folds it with the stream
//! reducer; the reduced message then drives the loop exactly like a
//! blocking response. Opening and draining the stream form one retryable
//! unit, so a retried call replays its signals to the callback from the
//! start.

use crate::agent::Agent;
use crate::error::Result;
use crate::provider::{ConverseRequest, ModelProvider};
use crate::resilience::Resilience;
use crate::stream::{reduce_stream, StreamCallback};
use crate::types::ModelResponse;

use super::runner::{single_call, tool_loop, Transport};
use super::types::{AgentInput, AgentResponse};

/// One streamed backend call without tools.
pub async fn stream_response(
    agent: &Agent,
    input: AgentInput,
    callback: Option<StreamCallback>,
) -> Result<(Agent, AgentResponse)> {
    single_call(agent, input, Transport::Streaming(callback)).await
}

/// Tool-calling loop over streamed backend calls.
pub async fn stream_with_tools(
    agent: &Agent,
    input: AgentInput,
    callback: Option<StreamCallback>,
) -> Result<(Agent, AgentResponse)> {
    tool_loop(agent, input, Transport::Streaming(callback)).await
}

pub(crate) async fn stream_backend_call(
    resilience: &Resilience,
    client: &dyn ModelProvider,
    request: &ConverseRequest,
    callback: &Option<StreamCallback>,
) -> Result<ModelResponse> {
    resilience
        .call_or_degrade(
            || {
                let callback = callback.clone();
                async move {
                    let events = client.stream_converse(request).await?;
                    reduce_stream(events, callback).await
                }
            },
            ModelResponse::degraded,
        )
        .await
}
