//! Inputs and results of one loop run.

use serde::{Deserialize, Serialize};

use crate::types::{MessageContent, ModelResponse, Usage};

/// Caller input for a run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AgentInput {
    /// Continue from memory without adding a user message.
    #[default]
    Empty,
    Text(String),
    Structured(serde_json::Value),
}

impl AgentInput {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// JSON form checked against the agent's input contract.
    pub fn as_value(&self) -> Option<serde_json::Value> {
        match self {
            Self::Empty => None,
            Self::Text(text) => Some(serde_json::Value::String(text.clone())),
            Self::Structured(value) => Some(value.clone()),
        }
    }

    pub(crate) fn into_content(self) -> Option<MessageContent> {
        match self {
            Self::Empty => None,
            Self::Text(text) => Some(MessageContent::Text(text)),
            Self::Structured(value) => Some(MessageContent::Json(value)),
        }
    }
}

impl From<&str> for AgentInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for AgentInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<serde_json::Value> for AgentInput {
    fn from(value: serde_json::Value) -> Self {
        Self::Structured(value)
    }
}

impl From<Option<String>> for AgentInput {
    fn from(text: Option<String>) -> Self {
        text.map_or(Self::Empty, Self::Text)
    }
}

/// Result of a run: the final backend response plus run totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub response: ModelResponse,
    /// Usage summed over every backend call of the run.
    pub usage: Usage,
    /// Backend calls made.
    pub iterations: u32,
}

impl AgentResponse {
    pub fn text(&self) -> String {
        self.response.text()
    }

    pub fn is_degraded(&self) -> bool {
        self.response.degraded
    }
}
