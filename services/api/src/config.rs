use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
///
/// Only what the process needs to boot lives here. The search tool reads its
/// RAG variables at call time, so a partially configured knowledge base
/// degrades to tool error results instead of blocking startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub api_key: String,
    pub live_model: String,
    pub voice: String,
    /// Overrides the Gemini Live endpoint, used to point sessions at a
    /// stand-in server.
    pub live_api_url: Option<String>,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        // GOOGLE_API_KEY is the documented name; GEMINI_API_KEY is honored
        // for compatibility with older deployments.
        let api_key = std::env::var("GOOGLE_API_KEY")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .map_err(|_| ConfigError::MissingVar("GOOGLE_API_KEY".to_string()))?;

        let live_model =
            std::env::var("LIVE_MODEL").unwrap_or_else(|_| gemini_live::DEFAULT_MODEL.to_string());

        let voice =
            std::env::var("LIVE_VOICE").unwrap_or_else(|_| gemini_live::DEFAULT_VOICE.to_string());

        let live_api_url = std::env::var("LIVE_API_URL").ok();

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            api_key,
            live_model,
            voice,
            live_api_url,
            log_level,
        })
    }
}
