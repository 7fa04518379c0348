//! Fold a sequence of stream events into one [`ModelResponse`].

use std::collections::BTreeMap;

use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, warn};

use super::{StreamCallback, StreamSignal};
use crate::error::Result;
use crate::types::{
    BlockDelta, ContentBlock, ModelResponse, StopReason, StreamEvent, ToolCall, ToolResult, Usage,
};

/// A content block still receiving deltas.
#[derive(Debug)]
enum PartialBlock {
    Text(String),
    ToolUse {
        id: String,
        name: String,
        seed: serde_json::Map<String, serde_json::Value>,
        /// Partial JSON, opaque until the stream is finished.
        input_json: String,
    },
    ToolResult(ToolResult),
    Thinking {
        thinking: String,
        signature: Option<String>,
    },
}

impl PartialBlock {
    fn placeholder(block: ContentBlock) -> Self {
        match block {
            ContentBlock::Text { text } => Self::Text(text),
            ContentBlock::ToolUse(call) => Self::ToolUse {
                id: call.id,
                name: call.name,
                seed: call.input,
                input_json: String::new(),
            },
            ContentBlock::ToolResult(result) => Self::ToolResult(result),
            ContentBlock::Thinking {
                thinking,
                signature,
            } => Self::Thinking {
                thinking,
                signature,
            },
        }
    }

    fn apply(&mut self, delta: BlockDelta) {
        match (self, delta) {
            (Self::Text(text), BlockDelta::TextDelta { text: chunk }) => text.push_str(&chunk),
            (Self::ToolUse { input_json, .. }, BlockDelta::InputJsonDelta { partial_json }) => {
                input_json.push_str(&partial_json)
            }
            (Self::Thinking { thinking, .. }, BlockDelta::ThinkingDelta { thinking: chunk }) => {
                thinking.push_str(&chunk)
            }
            (Self::Thinking { signature, .. }, BlockDelta::SignatureDelta { signature: chunk }) => {
                signature.get_or_insert_with(String::new).push_str(&chunk)
            }
            (_, delta) => debug!(?delta, "delta does not apply to block kind; ignored"),
        }
    }

    fn finish(self) -> ContentBlock {
        match self {
            Self::Text(text) => ContentBlock::Text { text },
            Self::ToolUse {
                id,
                name,
                seed,
                input_json,
            } => {
                let input = if input_json.trim().is_empty() {
                    seed
                } else {
                    match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&input_json) {
                        Ok(input) => input,
                        Err(err) => {
                            warn!(tool = %name, error = %err, "tool input is not a JSON object; using start input");
                            seed
                        }
                    }
                };
                ContentBlock::ToolUse(ToolCall { id, name, input })
            }
            Self::ToolResult(result) => ContentBlock::ToolResult(result),
            Self::Thinking {
                thinking,
                signature,
            } => ContentBlock::Thinking {
                thinking,
                signature,
            },
        }
    }
}

/// Accumulates stream events in arrival order.
#[derive(Default)]
pub struct StreamReducer {
    blocks: BTreeMap<usize, PartialBlock>,
    usage: Usage,
    stop_reason: Option<StopReason>,
    callback: Option<StreamCallback>,
}

impl StreamReducer {
    pub fn new(callback: Option<StreamCallback>) -> Self {
        Self {
            callback,
            ..Self::default()
        }
    }

    /// Fold one event. The callback, if any, sees the event's signal first.
    pub fn apply(&mut self, event: StreamEvent) {
        if let Some(callback) = &self.callback {
            if let Some(signal) = StreamSignal::classify(&event) {
                callback(&signal);
            }
        }

        match event {
            StreamEvent::MessageStart { message } => self.usage.absorb(&message.usage),
            StreamEvent::ContentBlockStart {
                index,
                content_block,
            } => {
                self.blocks
                    .insert(index, PartialBlock::placeholder(content_block));
            }
            StreamEvent::ContentBlockDelta { index, delta } => match self.blocks.get_mut(&index) {
                Some(block) => block.apply(delta),
                None => debug!(index, "delta for unknown block index; ignored"),
            },
            StreamEvent::MessageDelta { delta, usage } => {
                if delta.stop_reason.is_some() {
                    self.stop_reason = delta.stop_reason;
                }
                if let Some(usage) = usage {
                    self.usage.absorb(&usage);
                }
            }
            StreamEvent::ContentBlockStop { .. }
            | StreamEvent::MessageStop
            | StreamEvent::Ping
            | StreamEvent::Unknown => {}
        }
    }

    /// The accumulated message, blocks ordered by index.
    pub fn finish(self) -> ModelResponse {
        ModelResponse {
            content: self
                .blocks
                .into_values()
                .map(PartialBlock::finish)
                .collect(),
            usage: self.usage,
            stop_reason: self.stop_reason,
            degraded: false,
        }
    }
}

/// Drain `events`, folding each into a [`StreamReducer`].
///
/// The first stream error aborts the reduction and is returned.
pub async fn reduce_stream(
    mut events: BoxStream<'_, Result<StreamEvent>>,
    callback: Option<StreamCallback>,
) -> Result<ModelResponse> {
    let mut reducer = StreamReducer::new(callback);
    while let Some(event) = events.next().await {
        reducer.apply(event?);
    }
    Ok(reducer.finish())
}
