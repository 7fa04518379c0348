//! Message and content types shared by memory, the tool loop and providers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Conversation role.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub input: serde_json::Map<String, serde_json::Value>,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

/// A tool execution result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub output: serde_json::Value,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(tool_call_id: impl Into<String>, output: serde_json::Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            output,
            is_error: false,
        }
    }

    pub fn error(tool_call_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            output: serde_json::json!({ "error": message.into() }),
            is_error: true,
        }
    }
}

/// One unit of a structured model response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse(ToolCall),
    ToolResult(ToolResult),
    Thinking {
        thinking: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Payload of a stored message.
///
/// Serialized adjacently tagged (`{"type": ..., "data": ...}`) so a dump
/// carries enough information to rebuild the typed value on load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MessageContent {
    Text(String),
    Json(serde_json::Value),
    Blocks(Vec<ContentBlock>),
    ToolResult(ToolResult),
}

impl MessageContent {
    /// Canonical string form used for history rendering and token estimates.
    pub fn canonical_string(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Json(value) => value.to_string(),
            Self::Blocks(blocks) => serde_json::to_string(blocks).unwrap_or_default(),
            Self::ToolResult(result) => serde_json::to_string(result).unwrap_or_default(),
        }
    }

    /// Tool calls carried by an assistant block message.
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        match self {
            Self::Blocks(blocks) => blocks
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolUse(call) => Some(call),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl std::fmt::Display for MessageContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical_string())
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<serde_json::Value> for MessageContent {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<Vec<ContentBlock>> for MessageContent {
    fn from(blocks: Vec<ContentBlock>) -> Self {
        Self::Blocks(blocks)
    }
}

impl From<ToolResult> for MessageContent {
    fn from(result: ToolResult) -> Self {
        Self::ToolResult(result)
    }
}

/// A message recorded in conversation memory. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    turn_id: String,
    role: Role,
    content: MessageContent,
    timestamp: DateTime<Utc>,
}

impl Message {
    pub(crate) fn new(turn_id: impl Into<String>, role: Role, content: MessageContent) -> Self {
        Self {
            turn_id: turn_id.into(),
            role,
            content,
            timestamp: Utc::now(),
        }
    }

    pub fn turn_id(&self) -> &str {
        &self.turn_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &MessageContent {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Content rendered in its canonical string form.
    pub fn text(&self) -> String {
        self.content.canonical_string()
    }
}
