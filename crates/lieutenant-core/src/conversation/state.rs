//! Reducer-owned conversation state.

use serde::{Deserialize, Serialize};

use super::Message;

/// Selects what a submission produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Multi-turn conversational reply, streamed into the transcript.
    #[default]
    Assistant,
    /// A single literal shell command, generated in one shot.
    Command,
}

/// The full conversation state.
///
/// A clone of this is published to the presentation layer after every
/// transition; there is no partial-diff contract. Only the reducer writes
/// any of these fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConversationState {
    /// Ordered transcript, insertion order = chronological. Append-only
    /// except for full reset.
    pub transcript: Vec<Message>,
    /// True from the moment a submission is accepted until its terminal
    /// settle. At most one submission is pending at a time.
    pub pending: bool,
    /// The active interaction mode. Switchable only while not pending.
    pub mode: Mode,
}

impl ConversationState {
    /// Returns the most recent transcript entry, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.transcript.last()
    }
}
