//! The conversation state machine.
//!
//! `Conversation` owns the transcript, the pending flag, and the active
//! interaction mode, and applies three classes of transitions: user submit,
//! streaming delta append, and terminal settle (success or error). After
//! every transition the full state is published as a snapshot on a watch
//! channel for the presentation layer to re-render from.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, watch};
use tracing::{debug, warn};

use super::{ConversationState, Message, Mode};
use crate::client::GenerativeClient;
use crate::error::{LieutenantError, Result};
use crate::instructions::{ASSISTANT_SYSTEM_INSTRUCTION, COMMAND_SYSTEM_INSTRUCTION};
use crate::session::SessionManager;

/// Local fallback notice appended when an assistant turn fails.
///
/// The wording is ours, never attributed to the remote service.
pub const ASSISTANT_ERROR_NOTICE: &str = "Sorry, I encountered an error. Please try again.";
/// Local fallback notice appended when command generation fails.
pub const COMMAND_ERROR_NOTICE: &str = "Sorry, I could not generate the command. Please try again.";

/// The conversation reducer.
///
/// Exclusively owns its [`ConversationState`]; no other component writes the
/// transcript or the pending flag. One instance exists per process, injected
/// with the single shared service client and session manager.
pub struct Conversation {
    client: Arc<dyn GenerativeClient>,
    sessions: Arc<SessionManager>,
    state: RwLock<ConversationState>,
    /// Bumped on every clear. Each in-flight turn carries the value observed
    /// at accept time; late deltas and settles are dropped on mismatch so a
    /// response arriving after a clear cannot resurrect the old transcript.
    generation: AtomicU64,
    snapshot_tx: watch::Sender<ConversationState>,
}

impl Conversation {
    /// Creates an idle conversation in assistant mode with an empty transcript.
    pub fn new(client: Arc<dyn GenerativeClient>, sessions: Arc<SessionManager>) -> Self {
        let (snapshot_tx, _) = watch::channel(ConversationState::default());
        Self {
            client,
            sessions,
            state: RwLock::new(ConversationState::default()),
            generation: AtomicU64::new(0),
            snapshot_tx,
        }
    }

    /// Returns a receiver observing a full state snapshot after every
    /// transition.
    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.snapshot_tx.subscribe()
    }

    /// Returns a clone of the current state.
    pub async fn snapshot(&self) -> ConversationState {
        self.state.read().await.clone()
    }

    /// Switches the interaction mode.
    ///
    /// Ignored while a submission is pending, so an in-flight response cannot
    /// be attributed to the wrong mode's rendering path. Never mutates the
    /// transcript.
    pub async fn set_mode(&self, mode: Mode) {
        let mut state = self.state.write().await;
        if state.pending {
            debug!(?mode, "mode switch ignored while a submission is pending");
            return;
        }
        state.mode = mode;
        self.publish(&state);
    }

    /// Submits one user turn and runs it to terminal settlement.
    ///
    /// Whitespace-only input and submits issued while another submission is
    /// pending are ignored without any transition. Once accepted, the turn
    /// always settles: the transcript gains the user message (content stored
    /// exactly as typed), assistant mode additionally gains the streaming
    /// placeholder, and `pending` is cleared again by the settle.
    pub async fn submit(&self, text: &str, mode: Mode) {
        let generation = {
            let mut state = self.state.write().await;
            if state.pending {
                debug!("submit ignored: a submission is already pending");
                return;
            }
            if text.trim().is_empty() {
                debug!("submit ignored: {}", LieutenantError::EmptyInput);
                return;
            }
            state.pending = true;
            state.mode = mode;
            state.transcript.push(Message::user(text));
            if mode == Mode::Assistant {
                // Streaming target for the incoming deltas.
                state.transcript.push(Message::model_placeholder());
            }
            self.publish(&state);
            self.generation.load(Ordering::SeqCst)
        };

        match mode {
            Mode::Assistant => self.run_assistant_turn(generation, text).await,
            Mode::Command => self.run_command_turn(generation, text).await,
        }
    }

    /// Clears the transcript and replaces the session with a fresh one.
    ///
    /// Allowed while a submission is pending: the in-flight remote call is
    /// not cancelled, but its late deltas and settle are discarded by the
    /// generation check. The transcript is never left partially cleared and
    /// `pending` is never left stuck.
    ///
    /// # Errors
    ///
    /// Returns an error if the replacement session cannot be created. The
    /// transcript is cleared regardless; the next assistant submission then
    /// settles with a service-unavailable notice.
    pub async fn clear(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            self.generation.fetch_add(1, Ordering::SeqCst);
            state.transcript.clear();
            state.pending = false;
            self.publish(&state);
        }
        self.sessions.reset(ASSISTANT_SYSTEM_INSTRUCTION).await?;
        Ok(())
    }

    async fn run_assistant_turn(&self, generation: u64, text: &str) {
        let Some(session) = self.sessions.current().await else {
            // No session: settle locally without contacting the service.
            self.settle_error(
                generation,
                LieutenantError::service_unavailable("no active session"),
            )
            .await;
            return;
        };

        let mut chunks = match self.client.stream_chat(&session, text).await {
            Ok(chunks) => chunks,
            Err(err) => {
                self.settle_error(generation, err).await;
                return;
            }
        };

        while let Some(chunk) = chunks.recv().await {
            match chunk {
                Ok(delta) => self.apply_delta(generation, &delta).await,
                Err(err) => {
                    self.settle_error(generation, err).await;
                    return;
                }
            }
        }

        self.settle_success(generation, None).await;
    }

    async fn run_command_turn(&self, generation: u64, text: &str) {
        match self
            .client
            .generate_once(text, COMMAND_SYSTEM_INSTRUCTION)
            .await
        {
            Ok(result) => self.settle_success(generation, Some(result)).await,
            Err(err) => self.settle_error(generation, err).await,
        }
    }

    /// Appends one streamed delta to the last transcript message, in arrival
    /// order.
    async fn apply_delta(&self, generation: u64, delta: &str) {
        let mut state = self.state.write().await;
        if self.is_stale(generation) || !state.pending {
            debug!("delta dropped: stale generation");
            return;
        }
        if let Some(message) = state.transcript.last_mut() {
            message.append(delta);
        }
        self.publish(&state);
    }

    /// Concludes a pending submission successfully.
    ///
    /// Command mode appends the trimmed result as a command message;
    /// assistant mode leaves the transcript alone since the deltas already
    /// assembled the content.
    async fn settle_success(&self, generation: u64, command_result: Option<String>) {
        let mut state = self.state.write().await;
        if self.is_stale(generation) {
            debug!("settle dropped: stale generation");
            return;
        }
        if let Some(result) = command_result {
            state.transcript.push(Message::command(result.trim()));
        }
        state.pending = false;
        self.publish(&state);
    }

    /// Concludes a pending submission with a local error notice.
    ///
    /// Partial streamed content is kept; the notice is appended after it as
    /// an ordinary model message so rendering stays uniform.
    async fn settle_error(&self, generation: u64, err: LieutenantError) {
        warn!(error = %err, "turn settled with an error");
        let mut state = self.state.write().await;
        if self.is_stale(generation) {
            debug!("settle dropped: stale generation");
            return;
        }
        let notice = match state.mode {
            Mode::Assistant => ASSISTANT_ERROR_NOTICE,
            Mode::Command => COMMAND_ERROR_NOTICE,
        };
        state.transcript.push(Message::model(notice));
        state.pending = false;
        self.publish(&state);
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    fn publish(&self, state: &ConversationState) {
        // Receivers may come and go; send_replace delivers regardless.
        self.snapshot_tx.send_replace(state.clone());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use tokio::sync::{Mutex, Notify, mpsc};

    use super::*;
    use crate::client::ChunkReceiver;
    use crate::conversation::MessageRole;
    use crate::session::Session;

    /// Scripted stand-in for the remote service.
    #[derive(Default)]
    struct MockClient {
        /// Items emitted by the next `stream_chat` call.
        chunks: Mutex<Vec<Result<String>>>,
        /// Result returned by the next `generate_once` call.
        once: Mutex<Option<Result<String>>>,
        /// When set, the stream waits for this notification before emitting.
        gate: Mutex<Option<Arc<Notify>>>,
        stream_calls: AtomicUsize,
        once_calls: AtomicUsize,
    }

    impl MockClient {
        async fn script_stream(&self, chunks: Vec<Result<String>>) {
            *self.chunks.lock().await = chunks;
        }

        async fn script_once(&self, result: Result<String>) {
            *self.once.lock().await = Some(result);
        }

        async fn gate_stream(&self) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            *self.gate.lock().await = Some(gate.clone());
            gate
        }
    }

    #[async_trait]
    impl GenerativeClient for MockClient {
        async fn create_session(&self, system_instruction: &str) -> Result<Session> {
            Ok(Session::new(system_instruction))
        }

        async fn stream_chat(&self, _session: &Session, _text: &str) -> Result<ChunkReceiver> {
            self.stream_calls.fetch_add(1, Ordering::SeqCst);
            let chunks = std::mem::take(&mut *self.chunks.lock().await);
            let gate = self.gate.lock().await.clone();
            let (tx, rx) = mpsc::channel(8);
            tokio::spawn(async move {
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                for chunk in chunks {
                    if tx.send(chunk).await.is_err() {
                        break;
                    }
                }
            });
            Ok(rx)
        }

        async fn generate_once(
            &self,
            _prompt: &str,
            _system_instruction: &str,
        ) -> Result<String> {
            self.once_calls.fetch_add(1, Ordering::SeqCst);
            self.once
                .lock()
                .await
                .take()
                .unwrap_or_else(|| Err(LieutenantError::internal("generate_once not scripted")))
        }
    }

    fn harness() -> (Arc<Conversation>, Arc<SessionManager>, Arc<MockClient>) {
        let client = Arc::new(MockClient::default());
        let sessions = Arc::new(SessionManager::new(client.clone()));
        let conversation = Arc::new(Conversation::new(client.clone(), sessions.clone()));
        (conversation, sessions, client)
    }

    async fn harness_with_session() -> (Arc<Conversation>, Arc<SessionManager>, Arc<MockClient>) {
        let (conversation, sessions, client) = harness();
        sessions.create(ASSISTANT_SYSTEM_INSTRUCTION).await.unwrap();
        (conversation, sessions, client)
    }

    /// Waits until a snapshot reports a pending submission.
    async fn wait_for_pending(conversation: &Conversation) {
        let mut rx = conversation.subscribe();
        loop {
            if rx.borrow_and_update().pending {
                return;
            }
            rx.changed().await.unwrap();
        }
    }

    #[tokio::test]
    async fn submit_appends_untrimmed_user_message_and_placeholder() {
        let (conversation, _, _) = harness_with_session().await;
        // Default script: the stream ends without emitting any delta.
        conversation.submit("  list files  ", Mode::Assistant).await;

        let state = conversation.snapshot().await;
        assert_eq!(state.transcript.len(), 2);
        assert_eq!(state.transcript[0].role, MessageRole::User);
        assert_eq!(state.transcript[0].content, "  list files  ");
        assert_eq!(state.transcript[1].role, MessageRole::Model);
        assert!(!state.pending);
    }

    #[tokio::test]
    async fn whitespace_only_submit_is_ignored() {
        let (conversation, _, client) = harness_with_session().await;
        conversation.submit("   \n\t ", Mode::Assistant).await;

        let state = conversation.snapshot().await;
        assert!(state.transcript.is_empty());
        assert!(!state.pending);
        assert_eq!(client.stream_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn assistant_stream_concatenates_deltas_in_order() {
        let (conversation, _, client) = harness_with_session().await;
        client
            .script_stream(vec![Ok("ls ".to_string()), Ok("-la".to_string())])
            .await;
        conversation.submit("list files", Mode::Assistant).await;

        let state = conversation.snapshot().await;
        let last = state.last_message().unwrap();
        assert_eq!(last.role, MessageRole::Model);
        assert_eq!(last.content, "ls -la");
        assert!(!last.is_command);
        assert!(!state.pending);
    }

    #[tokio::test]
    async fn command_result_is_trimmed_and_flagged() {
        let (conversation, _, client) = harness();
        client.script_once(Ok("  ls -la\n".to_string())).await;
        conversation.submit("list files", Mode::Command).await;

        let state = conversation.snapshot().await;
        // No streaming placeholder in command mode: user message + result.
        assert_eq!(state.transcript.len(), 2);
        let last = state.last_message().unwrap();
        assert_eq!(last.role, MessageRole::Model);
        assert_eq!(last.content, "ls -la");
        assert!(last.is_command);
        assert!(!state.pending);
        assert_eq!(client.once_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn command_settle_does_not_mutate_earlier_messages() {
        let (conversation, _, client) = harness();
        client.script_once(Ok("pwd".to_string())).await;
        conversation.submit("where am i", Mode::Command).await;
        let before = conversation.snapshot().await.transcript;

        client.script_once(Ok("ls".to_string())).await;
        conversation.submit("list", Mode::Command).await;

        let state = conversation.snapshot().await;
        assert_eq!(state.transcript[..before.len()], before[..]);
        assert_eq!(state.transcript.len(), before.len() + 2);
    }

    #[tokio::test]
    async fn command_failure_appends_error_notice() {
        let (conversation, _, _) = harness();
        // generate_once is unscripted and fails.
        conversation.submit("list files", Mode::Command).await;

        let state = conversation.snapshot().await;
        let last = state.last_message().unwrap();
        assert_eq!(last.content, COMMAND_ERROR_NOTICE);
        assert!(!last.is_command);
        assert!(!state.pending);
    }

    #[tokio::test]
    async fn stream_failure_keeps_partial_content_and_appends_notice() {
        let (conversation, _, client) = harness_with_session().await;
        client
            .script_stream(vec![
                Ok("Sure, here".to_string()),
                Err(LieutenantError::stream_interrupted("connection reset")),
            ])
            .await;
        conversation.submit("help me", Mode::Assistant).await;

        let state = conversation.snapshot().await;
        assert_eq!(state.transcript.len(), 3);
        assert_eq!(state.transcript[1].content, "Sure, here");
        assert_eq!(state.transcript[2].content, ASSISTANT_ERROR_NOTICE);
        assert!(!state.pending);
    }

    #[tokio::test]
    async fn assistant_submit_without_session_settles_unavailable() {
        let (conversation, _, client) = harness();
        conversation.submit("hello", Mode::Assistant).await;

        let state = conversation.snapshot().await;
        assert_eq!(
            state.last_message().unwrap().content,
            ASSISTANT_ERROR_NOTICE
        );
        assert!(!state.pending);
        // The service was never contacted.
        assert_eq!(client.stream_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn submit_while_pending_is_ignored() {
        let (conversation, _, client) = harness_with_session().await;
        let gate = client.gate_stream().await;
        client.script_stream(vec![Ok("hi".to_string())]).await;

        let background = conversation.clone();
        let turn = tokio::spawn(async move {
            background.submit("first", Mode::Assistant).await;
        });
        wait_for_pending(&conversation).await;

        conversation.submit("second", Mode::Assistant).await;
        let state = conversation.snapshot().await;
        assert_eq!(state.transcript.len(), 2);
        assert_eq!(state.transcript[0].content, "first");
        assert_eq!(client.stream_calls.load(Ordering::SeqCst), 1);

        gate.notify_one();
        turn.await.unwrap();
        assert!(!conversation.snapshot().await.pending);
    }

    #[tokio::test]
    async fn set_mode_is_ignored_while_pending() {
        let (conversation, _, client) = harness_with_session().await;
        let gate = client.gate_stream().await;
        client.script_stream(vec![]).await;

        let background = conversation.clone();
        let turn = tokio::spawn(async move {
            background.submit("hello", Mode::Assistant).await;
        });
        wait_for_pending(&conversation).await;

        conversation.set_mode(Mode::Command).await;
        assert_eq!(conversation.snapshot().await.mode, Mode::Assistant);

        gate.notify_one();
        turn.await.unwrap();
        conversation.set_mode(Mode::Command).await;
        assert_eq!(conversation.snapshot().await.mode, Mode::Command);
    }

    #[tokio::test]
    async fn clear_resets_transcript_and_replaces_session() {
        let (conversation, sessions, client) = harness_with_session().await;
        let before = sessions.current().await.unwrap();
        client.script_once(Ok("ls".to_string())).await;
        conversation.submit("list", Mode::Command).await;

        conversation.clear().await.unwrap();

        let state = conversation.snapshot().await;
        assert!(state.transcript.is_empty());
        assert!(!state.pending);
        assert_ne!(sessions.current().await.unwrap().id, before.id);
    }

    #[tokio::test]
    async fn late_results_after_clear_are_discarded() {
        let (conversation, _, client) = harness_with_session().await;
        let gate = client.gate_stream().await;
        client
            .script_stream(vec![Ok("stale ".to_string()), Ok("reply".to_string())])
            .await;

        let background = conversation.clone();
        let turn = tokio::spawn(async move {
            background.submit("hello", Mode::Assistant).await;
        });
        wait_for_pending(&conversation).await;

        conversation.clear().await.unwrap();
        gate.notify_one();
        turn.await.unwrap();

        let state = conversation.snapshot().await;
        assert!(state.transcript.is_empty());
        assert!(!state.pending);
    }

    #[tokio::test]
    async fn snapshots_are_published_on_every_transition() {
        let (conversation, _, client) = harness_with_session().await;
        let mut rx = conversation.subscribe();
        client.script_stream(vec![Ok("hi".to_string())]).await;
        conversation.submit("hello", Mode::Assistant).await;

        rx.changed().await.unwrap();
        let state = rx.borrow_and_update().clone();
        assert!(!state.pending);
        assert_eq!(state.last_message().unwrap().content, "hi");
    }
}
