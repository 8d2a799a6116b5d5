//! Gemini service integration for Local Lieutenant.
//!
//! Provides the REST-backed [`GeminiClient`] implementation of the core's
//! `GenerativeClient` boundary, plus secret configuration loading.

pub mod config;
pub mod gemini_client;

pub use config::{GeminiConfig, SecretConfig, load_secret_config};
pub use gemini_client::{DEFAULT_GEMINI_MODEL, GeminiClient};
