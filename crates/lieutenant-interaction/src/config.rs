//! Configuration file management for Lieutenant.
//!
//! Supports reading secrets from `~/.config/lieutenant/secret.json`.
//! Error messages never contain the key material itself.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use lieutenant_core::error::{LieutenantError, Result};

/// Root configuration structure for secret.json
#[derive(Debug, Clone, Deserialize)]
pub struct SecretConfig {
    #[serde(default)]
    pub gemini: Option<GeminiConfig>,
}

/// Gemini API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    #[serde(default)]
    pub model_name: Option<String>,
}

/// Loads the secret configuration file from ~/.config/lieutenant/secret.json
///
/// # Errors
///
/// Returns a `Config` error if the file is missing, unreadable, or not valid
/// JSON.
pub fn load_secret_config() -> Result<SecretConfig> {
    load_secret_config_from(&config_path()?)
}

pub(crate) fn load_secret_config_from(path: &Path) -> Result<SecretConfig> {
    if !path.exists() {
        return Err(LieutenantError::config(format!(
            "Configuration file not found at: {}",
            path.display()
        )));
    }

    let content = fs::read_to_string(path).map_err(|e| {
        LieutenantError::config(format!(
            "Failed to read configuration file at {}: {}",
            path.display(),
            e
        ))
    })?;

    serde_json::from_str(&content).map_err(|e| {
        LieutenantError::config(format!(
            "Failed to parse configuration file at {}: {}",
            path.display(),
            e
        ))
    })
}

/// Returns the path to the configuration file: ~/.config/lieutenant/secret.json
fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LieutenantError::config("Could not determine home directory"))?;
    Ok(home.join(".config").join("lieutenant").join("secret.json"))
}
