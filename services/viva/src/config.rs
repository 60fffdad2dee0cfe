//! Application Configuration Module
//!
//! Centralizes the configuration for the terminal session runner. Settings
//! are loaded from environment variables into a single shareable struct.

use std::env;
use tracing::Level;

/// Which backend produces assistant turns and feedback.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Talk to the language model directly.
    Gemini,
    /// Go through the relay service.
    Relay,
}

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub google_api_key: Option<String>,
    pub chat_model: String,
    pub relay_url: Option<String>,
    pub backend: Backend,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `VIVA_BACKEND`: "gemini" or "relay". Defaults to "gemini".
    // *   `GOOGLE_API_KEY`: Credential for the gemini backend. Optional;
    //       without it the session runs on scripted fallbacks.
    // *   `RELAY_URL`: Base URL of the relay service. Required for "relay".
    // *   `CHAT_MODEL`: (Optional) Model for the gemini backend. Defaults to
    //       "gemini-2.0-flash".
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. Useful for local development, ignored if absent.
        dotenvy::dotenv().ok();

        let backend_str = env::var("VIVA_BACKEND").unwrap_or_else(|_| "gemini".to_string());
        let backend = match backend_str.to_lowercase().as_str() {
            "relay" => Backend::Relay,
            _ => Backend::Gemini,
        };

        let google_api_key = env::var("GOOGLE_API_KEY").ok();
        let relay_url = env::var("RELAY_URL").ok();
        let chat_model =
            env::var("CHAT_MODEL").unwrap_or_else(|_| viva_core::gemini::DEFAULT_MODEL.to_string());

        let log_level_str = env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        if backend == Backend::Relay && relay_url.is_none() {
            return Err(ConfigError::MissingVar(
                "RELAY_URL must be set for the relay backend".to_string(),
            ));
        }

        Ok(Self {
            google_api_key,
            chat_model,
            relay_url,
            backend,
            log_level,
        })
    }
}
