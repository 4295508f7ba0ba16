//! Conversation state: the `Session` contract and its in-memory implementation.
//!
//! The agent loop only needs to read history as chat messages, append
//! assistant/tool messages, and roll back a failed tool round. Rollback is a
//! versioned log: a `Checkpoint` records the message count plus the history
//! epoch, and restoring truncates back to that count. Anything that rewrites
//! earlier history (compaction) bumps the epoch, which invalidates older
//! checkpoints instead of silently truncating the wrong messages.

use std::ops::Range;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::inference::types::{ChatMessage, Role, ToolCallResponse};

use super::errors::AgentError;

// ─── Contract ───────────────────────────────────────────────────────────────

/// Extra data attached to an assistant turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantMetadata {
    pub reasoning_content: String,
}

/// Opaque rollback token handed out by `Session::checkpoint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    len: usize,
    epoch: u64,
}

impl Checkpoint {
    pub fn new(len: usize, epoch: u64) -> Self {
        Self { len, epoch }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// What the agent loop needs from a conversation.
pub trait Session: Send + Sync {
    /// Identifier attached to task-manager payloads, if any.
    fn session_id(&self) -> Option<&str>;

    /// Full history in provider message shape.
    fn as_dicts(&self) -> Vec<ChatMessage>;

    fn add_assistant(
        &mut self,
        text: &str,
        tool_calls: Option<Vec<ToolCallResponse>>,
        metadata: Option<AssistantMetadata>,
    );

    fn add_tool_result(&mut self, tool_call_id: &str, text: &str);

    fn checkpoint(&self) -> Checkpoint;

    /// Roll back to `checkpoint`. Fails if history was rewritten since.
    fn restore(&mut self, checkpoint: Checkpoint) -> Result<(), AgentError>;

    /// Most recent user message text (used for fallback task titles).
    fn last_user_message(&self) -> Option<String> {
        None
    }

    /// Replace `range` of the history with a single summary note.
    ///
    /// Returns `false` when the session does not support compaction.
    fn compact(&mut self, _range: Range<usize>, _summary: &str) -> bool {
        false
    }
}

// ─── ConversationManager ────────────────────────────────────────────────────

/// A single stored message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: String,
    /// ISO 8601 timestamp.
    pub timestamp: String,
    pub message: ChatMessage,
}

impl ConversationMessage {
    fn new(message: ChatMessage) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            message,
        }
    }
}

/// In-memory conversation history implementing [`Session`].
#[derive(Debug, Clone, Default)]
pub struct ConversationManager {
    session_id: Option<String>,
    messages: Vec<ConversationMessage>,
    /// Bumped whenever existing messages are rewritten.
    epoch: u64,
}

impl ConversationManager {
    /// Empty conversation without a session id.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty conversation tagged with `session_id`.
    pub fn with_session_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }

    pub fn add_system_message(&mut self, content: &str) {
        self.push(ChatMessage::text(Role::System, content));
    }

    pub fn add_user_message(&mut self, content: &str) {
        self.push(ChatMessage::text(Role::User, content));
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn push(&mut self, message: ChatMessage) {
        self.messages.push(ConversationMessage::new(message));
    }
}

impl Session for ConversationManager {
    fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    fn as_dicts(&self) -> Vec<ChatMessage> {
        self.messages.iter().map(|m| m.message.clone()).collect()
    }

    fn add_assistant(
        &mut self,
        text: &str,
        tool_calls: Option<Vec<ToolCallResponse>>,
        metadata: Option<AssistantMetadata>,
    ) {
        self.push(ChatMessage {
            role: Role::Assistant,
            content: Some(text.to_string()),
            tool_call_id: None,
            tool_calls,
            reasoning_content: metadata.map(|m| m.reasoning_content),
        });
    }

    fn add_tool_result(&mut self, tool_call_id: &str, text: &str) {
        self.push(ChatMessage {
            role: Role::Tool,
            content: Some(text.to_string()),
            tool_call_id: Some(tool_call_id.to_string()),
            tool_calls: None,
            reasoning_content: None,
        });
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint::new(self.messages.len(), self.epoch)
    }

    fn restore(&mut self, checkpoint: Checkpoint) -> Result<(), AgentError> {
        if checkpoint.epoch() != self.epoch || checkpoint.len() > self.messages.len() {
            return Err(AgentError::StaleCheckpoint);
        }
        let dropped = self.messages.len() - checkpoint.len();
        self.messages.truncate(checkpoint.len());
        tracing::debug!(dropped, "session restored to checkpoint");
        Ok(())
    }

    fn last_user_message(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.message.role == Role::User)
            .and_then(|m| m.message.content.clone())
    }

    fn compact(&mut self, range: Range<usize>, summary: &str) -> bool {
        if range.start >= range.end || range.end > self.messages.len() {
            return false;
        }
        let note = ConversationMessage::new(ChatMessage::text(Role::System, summary));
        self.messages.splice(range, std::iter::once(note));
        self.epoch += 1;
        true
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
