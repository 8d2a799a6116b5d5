//! Transcript message types.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Represents the author of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message typed by the user.
    User,
    /// Message produced by the model.
    Model,
}

/// One transcript entry.
///
/// The role is immutable once created. Content is append-only while a
/// streaming reply is in flight and frozen after the turn settles; all other
/// messages set it exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    /// True when `content` is a literal shell command rather than prose.
    #[serde(default)]
    pub is_command: bool,
    /// Timestamp when the message was created (ISO 8601 format).
    pub timestamp: String,
}

impl Message {
    fn new(role: MessageRole, content: String, is_command: bool) -> Self {
        Self {
            role,
            content,
            is_command,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// Creates a user message. Content is stored exactly as typed.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content.into(), false)
    }

    /// Creates a model message with its full content.
    pub fn model(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Model, content.into(), false)
    }

    /// Creates the empty model message used as the streaming target in
    /// assistant mode.
    pub fn model_placeholder() -> Self {
        Self::new(MessageRole::Model, String::new(), false)
    }

    /// Creates a command-mode result carrying a literal shell command.
    pub fn command(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Model, content.into(), true)
    }

    /// Appends one streamed delta to the content.
    pub fn append(&mut self, chunk: &str) {
        self.content.push_str(chunk);
    }
}
