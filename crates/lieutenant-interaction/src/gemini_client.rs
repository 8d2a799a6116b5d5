//! GeminiClient - Direct REST API implementation for Gemini.
//!
//! This client calls the Gemini REST API directly without SDK dependency.
//! The API itself is stateless, so the multi-turn context behind each
//! session handle is kept here, keyed by session id, and replayed on every
//! streaming call. Configuration is loaded from secret.json or environment
//! variables.

use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use lieutenant_core::client::{ChunkReceiver, GenerativeClient};
use lieutenant_core::error::{LieutenantError, Result};
use lieutenant_core::session::Session;

use crate::config::load_secret_config;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const CHUNK_CHANNEL_CAPACITY: usize = 32;

/// Generative service client backed by the Gemini HTTP API.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    /// Per-session conversational context, keyed by session handle.
    histories: Arc<Mutex<HashMap<String, Vec<Content>>>>,
}

impl GeminiClient {
    /// Creates a new client with the provided API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            histories: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Loads configuration from secret.json or environment variables.
    ///
    /// Priority:
    /// 1. ~/.config/lieutenant/secret.json
    /// 2. Environment variables (GEMINI_API_KEY, GEMINI_MODEL_NAME)
    ///
    /// Model name defaults to `gemini-2.5-flash` if not specified.
    pub fn try_from_env() -> Result<Self> {
        if let Ok(config) = load_secret_config() {
            if let Some(gemini) = config.gemini {
                let model = gemini
                    .model_name
                    .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());
                return Ok(Self::new(gemini.api_key, model));
            }
        }

        let api_key = env::var("GEMINI_API_KEY").map_err(|_| {
            LieutenantError::config(
                "GEMINI_API_KEY not found in ~/.config/lieutenant/secret.json or environment variables",
            )
        })?;

        let model = env::var("GEMINI_MODEL_NAME").unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.into());
        Ok(Self::new(api_key, model))
    }

    /// Overrides the model after construction.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn url(&self, operation: &str, sse: bool) -> String {
        let mut url = format!(
            "{}/{model}:{operation}?key={api_key}",
            BASE_URL,
            model = self.model,
            api_key = self.api_key
        );
        if sse {
            url.push_str("&alt=sse");
        }
        url
    }
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    async fn create_session(&self, system_instruction: &str) -> Result<Session> {
        let session = Session::new(system_instruction);
        self.histories
            .lock()
            .await
            .insert(session.id.clone(), Vec::new());
        debug!(session_id = %session.id, "created Gemini chat session");
        Ok(session)
    }

    async fn stream_chat(&self, session: &Session, text: &str) -> Result<ChunkReceiver> {
        let mut contents = {
            let histories = self.histories.lock().await;
            histories.get(&session.id).cloned().unwrap_or_default()
        };
        contents.push(Content::user(text));

        let request = GenerateContentRequest {
            contents,
            system_instruction: Some(Content::system(&session.system_instruction)),
        };

        let response = self
            .client
            .post(self.url("streamGenerateContent", true))
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                LieutenantError::service_unavailable(format!("Gemini API request failed: {err}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read Gemini error body".to_string());
            return Err(map_http_error(status, body));
        }

        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let histories = self.histories.clone();
        let session_id = session.id.clone();
        let user_turn = Content::user(text);

        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut lines = SseLineBuffer::default();
            let mut assembled = String::new();
            let mut completed = true;

            'body: while let Some(piece) = body.next().await {
                let piece = match piece {
                    Ok(piece) => piece,
                    Err(err) => {
                        warn!(error = %err, "Gemini stream failed mid-response");
                        let _ = tx
                            .send(Err(LieutenantError::stream_interrupted(format!(
                                "Gemini stream failed: {err}"
                            ))))
                            .await;
                        completed = false;
                        break;
                    }
                };

                for line in lines.push(&piece) {
                    let Some(delta) = extract_sse_delta(&line) else {
                        continue;
                    };
                    assembled.push_str(&delta);
                    if tx.send(Ok(delta)).await.is_err() {
                        // Receiver gone; nothing left to deliver.
                        completed = false;
                        break 'body;
                    }
                }
            }

            if completed {
                // Record the finished exchange so the next turn replays it.
                let mut histories = histories.lock().await;
                let history = histories.entry(session_id).or_default();
                history.push(user_turn);
                history.push(Content::model(&assembled));
            }
        });

        Ok(rx)
    }

    async fn generate_once(&self, prompt: &str, system_instruction: &str) -> Result<String> {
        let request = GenerateContentRequest {
            contents: vec![Content::user(prompt)],
            system_instruction: Some(Content::system(system_instruction)),
        };

        let response = self
            .client
            .post(self.url("generateContent", false))
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                LieutenantError::service_unavailable(format!("Gemini API request failed: {err}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read Gemini error body".to_string());
            return Err(map_http_error(status, body));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|err| {
            LieutenantError::service_unavailable(format!("Failed to parse Gemini response: {err}"))
        })?;

        extract_text(parsed).ok_or_else(|| {
            LieutenantError::service_unavailable(
                "Gemini API returned no text in the response candidates",
            )
        })
    }

    async fn discard_session(&self, session: &Session) {
        self.histories.lock().await.remove(&session.id);
        debug!(session_id = %session.id, "discarded Gemini chat session");
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Clone, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

impl Content {
    fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part { text: text.into() }],
        }
    }

    fn model(text: impl Into<String>) -> Self {
        Self {
            role: "model".to_string(),
            parts: vec![Part { text: text.into() }],
        }
    }

    fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            parts: vec![Part { text: text.into() }],
        }
    }
}

#[derive(Clone, Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Accumulates raw response bytes and yields complete lines.
///
/// Conversion to text happens per line, so a multi-byte character split
/// across network chunks is never cut in half.
#[derive(Default)]
struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            lines.push(line.trim_end_matches(['\n', '\r']).to_string());
        }
        lines
    }
}

/// Extracts the text delta from one SSE line, if it carries one.
fn extract_sse_delta(line: &str) -> Option<String> {
    let payload = line.strip_prefix("data:")?.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<GenerateContentResponse>(payload) {
        Ok(response) => extract_text(response),
        Err(err) => {
            debug!(error = %err, "skipping unparseable SSE payload");
            None
        }
    }
}

fn extract_text(response: GenerateContentResponse) -> Option<String> {
    response
        .candidates
        .and_then(|mut candidates| candidates.pop())
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
}

fn map_http_error(status: StatusCode, body: String) -> LieutenantError {
    let message = serde_json::from_str::<ErrorWrapper>(&body)
        .map(|wrapper| {
            let status_text = wrapper.error.status.unwrap_or_default();
            let msg = wrapper.error.message.unwrap_or_else(|| body.clone());
            if status_text.is_empty() {
                msg
            } else {
                format!("{status_text}: {msg}")
            }
        })
        .unwrap_or_else(|_| body.clone());

    LieutenantError::service_unavailable(format!("{}: {message}", status.as_u16()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_line_buffer_splits_across_pushes() {
        let mut buffer = SseLineBuffer::default();
        assert!(buffer.push(b"data: {\"a\"").is_empty());
        let lines = buffer.push(b": 1}\r\n\r\ndata: x\n");
        assert_eq!(lines, vec!["data: {\"a\": 1}", "", "data: x"]);
    }

    #[test]
    fn extract_sse_delta_reads_candidate_text() {
        let line = r#"data: {"candidates": [{"content": {"parts": [{"text": "ls -la"}]}}]}"#;
        assert_eq!(extract_sse_delta(line).as_deref(), Some("ls -la"));
    }

    #[test]
    fn extract_sse_delta_ignores_non_data_lines() {
        assert!(extract_sse_delta(": keep-alive").is_none());
        assert!(extract_sse_delta("data:").is_none());
        assert!(extract_sse_delta("data: [DONE]").is_none());
    }

    #[test]
    fn extract_sse_delta_skips_chunks_without_text() {
        let line = r#"data: {"candidates": [{"content": {"parts": []}}]}"#;
        assert!(extract_sse_delta(line).is_none());
        let line = r#"data: {"candidates": []}"#;
        assert!(extract_sse_delta(line).is_none());
    }

    #[test]
    fn map_http_error_uses_service_error_body() {
        let body = r#"{"error": {"code": 429, "message": "quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#;
        let err = map_http_error(StatusCode::TOO_MANY_REQUESTS, body.to_string());
        assert!(err.is_service_unavailable());
        assert!(err.to_string().contains("RESOURCE_EXHAUSTED: quota exceeded"));
    }

    #[test]
    fn map_http_error_falls_back_to_raw_body() {
        let err = map_http_error(StatusCode::BAD_GATEWAY, "upstream down".to_string());
        assert!(err.to_string().contains("upstream down"));
    }

    #[tokio::test]
    async fn sessions_track_their_history_entries() {
        let client = GeminiClient::new("test-key", DEFAULT_GEMINI_MODEL);

        let session = client.create_session("be helpful").await.unwrap();
        assert!(client.histories.lock().await.contains_key(&session.id));

        client.discard_session(&session).await;
        assert!(!client.histories.lock().await.contains_key(&session.id));
    }
}
