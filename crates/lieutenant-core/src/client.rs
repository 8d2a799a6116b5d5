//! Boundary trait for the remote generative-language service.
//!
//! The conversation reducer and session manager only ever talk to the service
//! through this trait, so the transport (REST, SDK, a scripted mock in tests)
//! is swappable without touching the state machine.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::session::Session;

/// An ordered, finite sequence of streamed text deltas.
///
/// The channel closing marks a clean end of stream; an `Err` item reports a
/// mid-stream failure. The sequence is consumed once and is not restartable.
pub type ChunkReceiver = mpsc::Receiver<Result<String>>;

/// Operations the remote generative service exposes to the core.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    /// Allocates a fresh conversational context bound to the given persona text.
    ///
    /// # Errors
    ///
    /// Returns an error if the service cannot allocate the context. The caller
    /// must treat failure as "no active session" rather than retry.
    async fn create_session(&self, system_instruction: &str) -> Result<Session>;

    /// Sends one user turn into the session's multi-turn context and returns
    /// the reply as a stream of text deltas.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be started. Failures after the
    /// stream has begun are reported as `Err` items on the returned channel.
    async fn stream_chat(&self, session: &Session, text: &str) -> Result<ChunkReceiver>;

    /// Stateless single-shot generation carrying its own system instruction.
    ///
    /// # Errors
    ///
    /// Returns an error on transport or service failure.
    async fn generate_once(&self, prompt: &str, system_instruction: &str) -> Result<String>;

    /// Releases any context held for the session.
    async fn discard_session(&self, _session: &Session) {}
}
