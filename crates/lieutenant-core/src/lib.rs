//! Core domain for Local Lieutenant.
//!
//! This crate owns the conversation state machine that mediates between a
//! user and a remote generative-language service in two interaction modes:
//! streamed assistant replies and one-shot shell-command generation. The
//! service transport lives behind the [`client::GenerativeClient`] trait;
//! presentation layers consume full [`conversation::ConversationState`]
//! snapshots.
//!
//! # Module Structure
//!
//! - `client`: Boundary trait for the generative service
//! - `conversation`: Transcript model and the reducer state machine
//! - `error`: Shared error type
//! - `instructions`: Fixed system-instruction constants
//! - `session`: Session model and lifecycle management

pub mod client;
pub mod conversation;
pub mod error;
pub mod instructions;
pub mod session;

// Re-export common types
pub use client::{ChunkReceiver, GenerativeClient};
pub use conversation::{Conversation, ConversationState, Message, MessageRole, Mode};
pub use error::{LieutenantError, Result};
pub use session::{Session, SessionManager};
