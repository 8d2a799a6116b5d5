//! Session domain model.
//!
//! This module contains the core Session entity that identifies one
//! multi-turn dialogue context on the generative service.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a multi-turn dialogue context.
///
/// The `id` is an opaque handle; the service client maps it to whatever
/// server-affiliated conversational state it keeps. The persona text is
/// fixed at creation time and never mutated. Command-mode requests are
/// stateless and never carry a `Session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub system_instruction: String,
    /// Timestamp when the session was created (ISO 8601 format).
    pub created_at: String,
}

impl Session {
    /// Creates a session with a fresh opaque handle.
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            system_instruction: system_instruction.into(),
            created_at: Utc::now().to_rfc3339(),
        }
    }
}
