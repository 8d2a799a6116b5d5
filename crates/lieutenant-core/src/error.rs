//! Error types for the Lieutenant application.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the entire Lieutenant application.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait. No variant is fatal: every
/// failure path settles the current turn and returns the conversation to an
/// idle, retryable state.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum LieutenantError {
    /// The remote generative service is unreachable or refused the request.
    ///
    /// A single failed call does not invalidate the active session, except a
    /// failed session creation, after which no session is current until the
    /// user retries.
    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    /// A streaming response failed after it had started.
    ///
    /// Partial content delivered before the failure is retained in the
    /// transcript; it is never rolled back.
    #[error("Stream interrupted: {message}")]
    StreamInterrupted { message: String },

    /// A submission with blank or whitespace-only text.
    ///
    /// Rejected before any state transition; never surfaced to the transcript.
    #[error("Empty input")]
    EmptyInput,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LieutenantError {
    /// Creates a ServiceUnavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    /// Creates a StreamInterrupted error
    pub fn stream_interrupted(message: impl Into<String>) -> Self {
        Self::StreamInterrupted {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this is a ServiceUnavailable error
    pub fn is_service_unavailable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable { .. })
    }

    /// Check if this is a StreamInterrupted error
    pub fn is_stream_interrupted(&self) -> bool {
        matches!(self, Self::StreamInterrupted { .. })
    }

    /// Check if this is an EmptyInput error
    pub fn is_empty_input(&self) -> bool {
        matches!(self, Self::EmptyInput)
    }
}

/// Conversion from anyhow::Error (transitional, should be removed eventually)
impl From<anyhow::Error> for LieutenantError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Conversion from String (for error messages)
impl From<String> for LieutenantError {
    fn from(err: String) -> Self {
        Self::Internal(err)
    }
}

/// A type alias for `Result<T, LieutenantError>`.
pub type Result<T> = std::result::Result<T, LieutenantError>;
