//! Application Configuration Module
//!
//! Loads settings for the profile wizard from the environment (and an
//! optional `.env` file) into a single struct that is handed to the speech
//! adapters and the interview scheduler.

use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use tracing::Level;

pub const DEFAULT_TRANSCRIPTION_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";
pub const DEFAULT_TTS_BINARY: &str = "espeak-ng";
pub const DEFAULT_TTS_VOICE_MARKER: &str = "mbrola";

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Without a key speech input is reported as unsupported.
    pub openai_api_key: Option<SecretString>,
    pub transcription_url: String,
    pub transcription_model: String,
    pub tts_binary: String,
    pub tts_voice_marker: String,
    pub interview_endpoint: Option<String>,
    pub interview_api_token: Option<SecretString>,
    pub input_device: Option<String>,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("Could not read env file: {0}")]
    EnvFile(#[from] dotenvy::Error),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `OPENAI_API_KEY`: (Optional) Key for the transcription endpoint.
    // *   `TRANSCRIPTION_URL`, `TRANSCRIPTION_MODEL`: (Optional) Whisper compatible endpoint and model.
    // *   `TTS_BINARY`: (Optional) The espeak-ng compatible binary. Defaults to "espeak-ng".
    // *   `TTS_VOICE_MARKER`: (Optional) Preferred voice name fragment. Defaults to "mbrola".
    // *   `INTERVIEW_ENDPOINT`, `INTERVIEW_API_TOKEN`: (Optional) Where submitted profiles are sent.
    // *   `INPUT_DEVICE`: (Optional) Microphone name; the host default otherwise.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads variables from `path` first, falling back to the process
    /// environment for anything the file does not set.
    pub fn from_env_file(path: &Path) -> Result<Self, ConfigError> {
        let mut vars = HashMap::new();
        for item in dotenvy::from_path_iter(path)? {
            let (key, value) = item?;
            vars.insert(key, value);
        }
        Self::from_lookup(|key| vars.get(key).cloned().or_else(|| env::var(key).ok()))
    }

    /// Builds the configuration from any key/value source. Empty values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let log_level_str = get("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        let config = Self {
            openai_api_key: get("OPENAI_API_KEY").map(SecretString::from),
            transcription_url: get("TRANSCRIPTION_URL")
                .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_URL.to_string()),
            transcription_model: get("TRANSCRIPTION_MODEL")
                .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string()),
            tts_binary: get("TTS_BINARY").unwrap_or_else(|| DEFAULT_TTS_BINARY.to_string()),
            tts_voice_marker: get("TTS_VOICE_MARKER")
                .unwrap_or_else(|| DEFAULT_TTS_VOICE_MARKER.to_string()),
            interview_endpoint: get("INTERVIEW_ENDPOINT"),
            interview_api_token: get("INTERVIEW_API_TOKEN").map(SecretString::from),
            input_device: get("INPUT_DEVICE"),
            log_level,
        };

        if config.interview_api_token.is_some() && config.interview_endpoint.is_none() {
            return Err(ConfigError::MissingVar(
                "INTERVIEW_ENDPOINT must be set when INTERVIEW_API_TOKEN is".to_string(),
            ));
        }

        Ok(config)
    }
}
