//! Backend-generated summaries of older context.

use std::sync::Arc;

use crate::error::Result;
use crate::provider::{ConverseRequest, ModelProvider};
use crate::resilience::Resilience;
use crate::types::{Message, MessageContent, ResponseShape, Role};

const SUMMARY_TEMPERATURE: f64 = 0.3;

const SUMMARY_INSTRUCTIONS: &str = "Summarize the conversation below. Keep facts, decisions, \
open questions and tool results the assistant will need later. Reply with the summary only.";

/// Backend handle used by the summarize truncation strategy.
#[derive(Clone)]
pub struct Summarizer {
    client: Arc<dyn ModelProvider>,
    model: String,
    resilience: Resilience,
}

impl Summarizer {
    pub fn new(client: Arc<dyn ModelProvider>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            resilience: Resilience::default(),
        }
    }

    pub fn with_resilience(mut self, resilience: Resilience) -> Self {
        self.resilience = resilience;
        self
    }

    /// Condense `messages` into one system message carrying the turn id of
    /// the oldest summarized message.
    pub(crate) async fn summarize(&self, messages: &[&Message]) -> Result<Message> {
        let turn_id = messages
            .first()
            .map(|message| message.turn_id().to_string())
            .unwrap_or_default();
        let transcript = Message::new(
            turn_id.clone(),
            Role::User,
            MessageContent::Text(render_transcript(messages)),
        );
        let request = ConverseRequest {
            model: self.model.clone(),
            temperature: SUMMARY_TEMPERATURE,
            max_tokens: None,
            system: Some(SUMMARY_INSTRUCTIONS.to_string()),
            messages: vec![transcript],
            response_shape: ResponseShape::Text,
            tools: None,
        };

        let response = self
            .resilience
            .call(|| self.client.converse(&request))
            .await?;

        Ok(Message::new(
            turn_id,
            Role::System,
            MessageContent::Text(format!(
                "Summary of earlier conversation:\n{}",
                response.text().trim()
            )),
        ))
    }
}

impl std::fmt::Debug for Summarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Summarizer")
            .field("provider", &self.client.provider_name())
            .field("model", &self.model)
            .field("resilience", &self.resilience)
            .finish()
    }
}

/// One `[role] content` line per message.
fn render_transcript(messages: &[&Message]) -> String {
    messages
        .iter()
        .map(|message| format!("[{}] {}", message.role(), message.text()))
        .collect::<Vec<_>>()
        .join("\n")
}
