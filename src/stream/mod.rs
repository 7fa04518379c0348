//! Streaming response reduction.

pub mod reducer;

pub use reducer::{reduce_stream, StreamReducer};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::StreamEvent;

/// Caller-facing signal derived from a protocol event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamSignal {
    MessageStart,
    TextDelta { text: String },
    ToolUseStart { id: String, name: String },
    ThinkingDelta { thinking: String },
    MessageStop,
}

/// Callback invoked inline for every signal, in event order.
pub type StreamCallback = Arc<dyn Fn(&StreamSignal) + Send + Sync>;

impl StreamSignal {
    /// Classify a protocol event; events without a signal map to `None`.
    pub fn classify(event: &StreamEvent) -> Option<Self> {
        use crate::types::{BlockDelta, ContentBlock};

        match event {
            StreamEvent::MessageStart { .. } => Some(Self::MessageStart),
            StreamEvent::MessageStop => Some(Self::MessageStop),
            StreamEvent::ContentBlockStart {
                content_block: ContentBlock::ToolUse(call),
                ..
            } => Some(Self::ToolUseStart {
                id: call.id.clone(),
                name: call.name.clone(),
            }),
            StreamEvent::ContentBlockDelta { delta, .. } => match delta {
                BlockDelta::TextDelta { text } => Some(Self::TextDelta { text: text.clone() }),
                BlockDelta::ThinkingDelta { thinking } => Some(Self::ThinkingDelta {
                    thinking: thinking.clone(),
                }),
                BlockDelta::InputJsonDelta { .. }
                | BlockDelta::SignatureDelta { .. }
                | BlockDelta::Unknown => None,
            },
            StreamEvent::ContentBlockStart { .. }
            | StreamEvent::ContentBlockStop { .. }
            | StreamEvent::MessageDelta { .. }
            | StreamEvent::Ping
            | StreamEvent::Unknown => None,
        }
    }
}
