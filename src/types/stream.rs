//! Streaming protocol events.

use serde::{Deserialize, Serialize};

use super::generation::StopReason;
use super::message::ContentBlock;
use super::usage::Usage;

/// One event of a streamed backend response.
///
/// Event types this crate does not know deserialize to [`StreamEvent::Unknown`]
/// and are ignored by the reducer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart {
        #[serde(default)]
        message: MessageStart,
    },
    ContentBlockStart {
        index: usize,
        content_block: ContentBlock,
    },
    ContentBlockDelta {
        index: usize,
        delta: BlockDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        #[serde(default)]
        delta: MessageDelta,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
    MessageStop,
    Ping,
    #[serde(other)]
    Unknown,
}

/// Header carried by `message_start`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MessageStart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Usage,
}

/// Top-level message changes carried by `message_delta`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MessageDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
}

/// Incremental change to one content block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    ThinkingDelta { thinking: String },
    SignatureDelta { signature: String },
    #[serde(other)]
    Unknown,
}
