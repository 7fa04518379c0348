//! Turn-scoped conversation memory with bounded retention.
//!
//! Every message belongs to a turn. A turn id is minted lazily by the first
//! message after a boundary and reused until [`ConversationMemory::end_turn`]
//! closes it. When `max_messages` is finite, the oldest messages are evicted
//! after each append so the log never exceeds the bound.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, TandemError};
use crate::types::{Message, MessageContent, Role};

/// A message rendered with its content in canonical string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub turn_id: String,
    pub role: Role,
    pub content: String,
}

/// In-process conversation log owned by one agent instance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConversationMemory {
    /// `None` means unbounded.
    max_messages: Option<usize>,
    current_turn_id: Option<String>,
    history: VecDeque<Message>,
}

impl ConversationMemory {
    /// Create an empty memory retaining at most `max_messages` messages.
    pub fn new(max_messages: Option<usize>) -> Self {
        Self {
            max_messages,
            current_turn_id: None,
            history: VecDeque::new(),
        }
    }

    /// Create an empty memory without a retention bound.
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn max_messages(&self) -> Option<usize> {
        self.max_messages
    }

    pub fn current_turn_id(&self) -> Option<&str> {
        self.current_turn_id.as_deref()
    }

    /// Open a turn if none is active and return the active turn id.
    pub fn initialize_turn(&mut self) -> &str {
        self.current_turn_id
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .as_str()
    }

    /// Close the active turn; the next message opens a new one.
    pub fn end_turn(&mut self) {
        self.current_turn_id = None;
    }

    /// Append a message to the active turn, opening one if needed.
    pub fn add_message(&mut self, role: Role, content: impl Into<MessageContent>) {
        let turn_id = self.initialize_turn().to_string();
        self.history
            .push_back(Message::new(turn_id, role, content.into()));
        self.evict();
    }

    fn evict(&mut self) {
        let Some(max) = self.max_messages else {
            return;
        };
        let excess = self.history.len().saturating_sub(max);
        if excess > 0 {
            self.history.drain(..excess);
            debug!(evicted = excess, max_messages = max, "memory evicted oldest messages");
        }
    }

    /// Messages with canonical string content, oldest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history
            .iter()
            .map(|message| HistoryEntry {
                turn_id: message.turn_id().to_string(),
                role: message.role(),
                content: message.text(),
            })
            .collect()
    }

    /// Typed messages, oldest first.
    pub fn messages(&self) -> impl ExactSizeIterator<Item = &Message> + DoubleEndedIterator {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Remove every message of `turn_id`.
    pub fn delete_turn(&mut self, turn_id: &str) -> Result<()> {
        let before = self.history.len();
        self.history.retain(|message| message.turn_id() != turn_id);
        if self.history.len() == before {
            return Err(TandemError::TurnNotFound(turn_id.to_string()));
        }
        if self.current_turn_id.as_deref() == Some(turn_id) {
            self.current_turn_id = None;
        }
        Ok(())
    }

    /// Rebuild with the same bound and active turn but a new message log.
    pub(crate) fn with_messages(&self, messages: Vec<Message>) -> Self {
        let mut rebuilt = Self {
            max_messages: self.max_messages,
            current_turn_id: self.current_turn_id.clone(),
            history: messages.into(),
        };
        rebuilt.evict();
        rebuilt
    }

    /// Self-describing snapshot suitable for transport.
    pub fn dump(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Rebuild a memory from [`ConversationMemory::dump`] output.
    pub fn load(snapshot: serde_json::Value) -> Result<Self> {
        let mut memory: Self = serde_json::from_value(snapshot)?;
        memory.evict();
        Ok(memory)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Self::load(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn messages_share_the_turn_until_it_ends() {
        let mut memory = ConversationMemory::unbounded();
        memory.add_message(Role::User, "hi");
        memory.add_message(Role::Assistant, "hello");
        memory.end_turn();
        memory.add_message(Role::User, "again");

        let history = memory.history();
        assert_eq!(history[0].turn_id, history[1].turn_id);
        assert_ne!(history[1].turn_id, history[2].turn_id);
    }

    #[test]
    fn initialize_turn_is_idempotent() {
        let mut memory = ConversationMemory::unbounded();
        let first = memory.initialize_turn().to_string();
        let second = memory.initialize_turn().to_string();

        assert_eq!(first, second);
        assert_eq!(memory.current_turn_id(), Some(first.as_str()));
    }

    #[test]
    fn delete_turn_of_unknown_id_fails() {
        let mut memory = ConversationMemory::unbounded();
        memory.add_message(Role::User, "hi");

        let err = memory.delete_turn("missing").unwrap_err();

        assert!(matches!(err, TandemError::TurnNotFound(id) if id == "missing"));
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn deleting_the_active_turn_closes_it() {
        let mut memory = ConversationMemory::unbounded();
        memory.add_message(Role::User, "hi");
        let turn = memory.current_turn_id().unwrap().to_string();

        memory.delete_turn(&turn).unwrap();

        assert!(memory.is_empty());
        assert_eq!(memory.current_turn_id(), None);
    }

    #[test]
    fn dump_layout_tags_content_type() {
        let mut memory = ConversationMemory::new(Some(3));
        memory.add_message(Role::User, json!({ "q": 1 }));

        let dump = memory.dump().unwrap();

        assert_eq!(dump["max_messages"], json!(3));
        assert_eq!(dump["history"][0]["role"], json!("user"));
        assert_eq!(dump["history"][0]["content"], json!({ "type": "json", "data": { "q": 1 } }));
        assert_eq!(dump["history"][0]["turn_id"], dump["current_turn_id"]);
    }
}
