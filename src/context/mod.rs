//! Context window management.
//!
//! Token counts are character-based estimates (four characters per token),
//! good enough to keep a conversation under a backend's window without a
//! tokenizer.

pub mod summary;

pub use summary::Summarizer;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, warn};

use crate::error::Result;
use crate::memory::ConversationMemory;
use crate::types::{Message, MessageContent};

/// Fixed per-message overhead added to every content estimate.
pub const MESSAGE_OVERHEAD_TOKENS: usize = 10;

/// Messages always kept verbatim by [`TruncationStrategy::Summarize`].
pub const MIN_KEEP_RECENT: usize = 5;

/// How an over-budget memory is brought back under the limit.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TruncationStrategy {
    #[default]
    OldestFirst,
    SlidingWindow,
    Summarize,
}

/// Token accounting for one memory against one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextUsage {
    pub used_tokens: usize,
    pub budget_tokens: usize,
    pub remaining_tokens: usize,
    pub usage_percent: u8,
}

impl ContextUsage {
    pub fn within_limit(&self) -> bool {
        self.used_tokens <= self.budget_tokens
    }
}

/// Estimated tokens for a piece of text, never less than one.
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() / 4).max(1)
}

/// Estimated tokens for one message's content including overhead.
pub fn estimate_message_tokens(content: &MessageContent) -> usize {
    estimate_tokens(&content.canonical_string()) + MESSAGE_OVERHEAD_TOKENS
}

/// Stateless window policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowManager {
    pub max_tokens: usize,
    /// Tokens held back for the backend's reply.
    pub reserved_tokens: usize,
    #[serde(default)]
    pub strategy: TruncationStrategy,
}

impl WindowManager {
    pub fn new(max_tokens: usize, reserved_tokens: usize, strategy: TruncationStrategy) -> Self {
        Self {
            max_tokens,
            reserved_tokens,
            strategy,
        }
    }

    /// Tokens available to the conversation itself.
    pub fn budget(&self) -> usize {
        self.max_tokens.saturating_sub(self.reserved_tokens)
    }

    pub fn memory_tokens(&self, memory: &ConversationMemory) -> usize {
        memory
            .messages()
            .map(|message| estimate_message_tokens(message.content()))
            .sum()
    }

    pub fn within_limit(&self, memory: &ConversationMemory) -> bool {
        self.memory_tokens(memory) <= self.budget()
    }

    pub fn context_usage(&self, memory: &ConversationMemory) -> ContextUsage {
        let used_tokens = self.memory_tokens(memory);
        let budget_tokens = self.budget();
        let usage_percent = if budget_tokens == 0 {
            100
        } else {
            (used_tokens.saturating_mul(100) / budget_tokens).min(100) as u8
        };
        ContextUsage {
            used_tokens,
            budget_tokens,
            remaining_tokens: budget_tokens.saturating_sub(used_tokens),
            usage_percent,
        }
    }

    /// Bring `memory` under the budget, returning a new memory.
    ///
    /// A memory already within the limit is returned unchanged. The
    /// summarize strategy needs a [`Summarizer`]; without one, or when the
    /// summary call fails, it falls back to dropping the oldest messages.
    pub async fn truncate(
        &self,
        memory: &ConversationMemory,
        summarizer: Option<&Summarizer>,
    ) -> Result<ConversationMemory> {
        if self.within_limit(memory) {
            return Ok(memory.clone());
        }

        match (self.strategy, summarizer) {
            (TruncationStrategy::OldestFirst | TruncationStrategy::SlidingWindow, _) => {
                Ok(self.keep_newest(memory))
            }
            (TruncationStrategy::Summarize, Some(summarizer)) => {
                match self.summarize(memory, summarizer).await {
                    Ok(truncated) => Ok(truncated),
                    Err(err) => {
                        warn!(error = %err, "summary call failed; dropping oldest messages instead");
                        Ok(self.keep_newest(memory))
                    }
                }
            }
            (TruncationStrategy::Summarize, None) => {
                debug!("no summarizer configured; dropping oldest messages instead");
                Ok(self.keep_newest(memory))
            }
        }
    }

    fn keep_newest(&self, memory: &ConversationMemory) -> ConversationMemory {
        let messages: Vec<&Message> = memory.messages().collect();
        let mut keep = newest_fitting(&messages, self.budget());
        // Results whose tool call was cut go with it.
        while keep > 0 && is_tool_result(messages[messages.len() - keep]) {
            keep -= 1;
        }
        let kept: Vec<Message> = messages[messages.len() - keep..]
            .iter()
            .map(|message| (*message).clone())
            .collect();
        debug!(
            dropped = messages.len() - keep,
            kept = keep,
            budget = self.budget(),
            "truncated context window"
        );
        memory.with_messages(kept)
    }

    async fn summarize(
        &self,
        memory: &ConversationMemory,
        summarizer: &Summarizer,
    ) -> Result<ConversationMemory> {
        let messages: Vec<&Message> = memory.messages().collect();
        let keep_recent = newest_fitting(&messages, self.budget() / 2)
            .max(MIN_KEEP_RECENT)
            .min(messages.len());
        let mut split = messages.len() - keep_recent;
        // Keep tool results next to the call that produced them.
        while split > 0 && is_tool_result(messages[split]) {
            split -= 1;
        }
        let keep_recent = messages.len() - split;
        // Everything is recent; nothing older to fold into a summary.
        if split == 0 {
            return Ok(memory.clone());
        }

        let (older, recent) = messages.split_at(split);
        let summary = summarizer.summarize(older).await?;
        let mut rebuilt = Vec::with_capacity(recent.len() + 1);
        rebuilt.push(summary);
        rebuilt.extend(recent.iter().map(|message| (*message).clone()));
        debug!(
            summarized = split,
            kept = keep_recent,
            "summarized older context"
        );
        Ok(memory.with_messages(rebuilt))
    }
}

fn is_tool_result(message: &Message) -> bool {
    matches!(message.content(), MessageContent::ToolResult(_))
}

/// Count of newest messages whose estimates together fit `budget`.
fn newest_fitting(messages: &[&Message], budget: usize) -> usize {
    let mut used = 0usize;
    let mut count = 0usize;
    for message in messages.iter().rev() {
        let tokens = estimate_message_tokens(message.content());
        if used + tokens > budget {
            break;
        }
        used += tokens;
        count += 1;
    }
    count
}
