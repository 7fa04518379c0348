//! Response shapes and backend responses.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::message::{ContentBlock, ToolCall};
use super::usage::Usage;

/// Shape the backend is asked to produce.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseShape {
    /// Free text only.
    #[default]
    Text,
    /// Either free text or a list of tool calls.
    TextOrToolCalls,
    /// A JSON document matching the schema.
    Json { schema: serde_json::Value },
}

/// Why the backend stopped generating.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
    Refusal,
}

/// A structured response from one backend call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ModelResponse {
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    /// Set when the resilience layer substituted this empty value for a
    /// failed call.
    #[serde(default)]
    pub degraded: bool,
}

impl ModelResponse {
    /// A plain text response.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            usage: Usage::default(),
            stop_reason: Some(StopReason::EndTurn),
            degraded: false,
        }
    }

    /// A response requesting the given tool calls.
    pub fn from_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            content: calls.into_iter().map(ContentBlock::ToolUse).collect(),
            usage: Usage::default(),
            stop_reason: Some(StopReason::ToolUse),
            degraded: false,
        }
    }

    /// The empty value returned when a call could not be completed.
    pub fn degraded() -> Self {
        Self {
            degraded: true,
            ..Self::default()
        }
    }

    /// Concatenated text of all text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool calls requested by this response, in block order.
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    pub fn has_tool_calls(&self) -> bool {
        self.content
            .iter()
            .any(|block| matches!(block, ContentBlock::ToolUse(_)))
    }
}
