//! Conversation domain module.
//!
//! This module contains the transcript model and the state machine that
//! drives it.
//!
//! # Module Structure
//!
//! - `message`: Transcript entry types (`MessageRole`, `Message`)
//! - `state`: Reducer-owned state snapshot (`Mode`, `ConversationState`)
//! - `reducer`: The conversation state machine (`Conversation`)

mod message;
mod reducer;
mod state;

// Re-export public API
pub use message::{Message, MessageRole};
pub use reducer::{ASSISTANT_ERROR_NOTICE, COMMAND_ERROR_NOTICE, Conversation};
pub use state::{ConversationState, Mode};
