//! Session lifecycle management.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use super::Session;
use crate::client::GenerativeClient;
use crate::error::Result;

/// Owns the identity of the current multi-turn conversation.
///
/// `SessionManager` is responsible for:
/// - Creating a fresh session at startup
/// - Exposing the currently active session
/// - Discarding and recreating the session on explicit reset
///
/// At most one session is current at a time. Command-mode requests bypass
/// the manager entirely.
pub struct SessionManager {
    client: Arc<dyn GenerativeClient>,
    current: RwLock<Option<Session>>,
}

impl SessionManager {
    /// Creates a new `SessionManager` with no current session.
    pub fn new(client: Arc<dyn GenerativeClient>) -> Self {
        Self {
            client,
            current: RwLock::new(None),
        }
    }

    /// Creates a fresh session and makes it current.
    ///
    /// # Errors
    ///
    /// Returns an error if the service cannot allocate a context. The manager
    /// is then left with no current session; callers must not retry
    /// automatically.
    pub async fn create(&self, system_instruction: &str) -> Result<Session> {
        let mut current = self.current.write().await;
        match self.client.create_session(system_instruction).await {
            Ok(session) => {
                debug!(session_id = %session.id, "created session");
                *current = Some(session.clone());
                Ok(session)
            }
            Err(err) => {
                *current = None;
                Err(err)
            }
        }
    }

    /// Returns the currently active session, if any.
    pub async fn current(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    /// Unconditionally discards any existing session and creates a fresh one.
    ///
    /// Used only by the explicit clear action. Repeated resets always yield an
    /// empty context, even though each call is a new allocation.
    ///
    /// # Errors
    ///
    /// Returns an error if the replacement session cannot be created; the old
    /// session is discarded regardless.
    pub async fn reset(&self, system_instruction: &str) -> Result<Session> {
        let previous = self.current.write().await.take();
        if let Some(session) = previous {
            debug!(session_id = %session.id, "discarding session");
            self.client.discard_session(&session).await;
        }
        self.create(system_instruction).await
    }
}
