//! Sync engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DRIFTWOOD_API_BASE_URL` - Base URL of the persistence service
//!
//! ## Optional
//! - `DRIFTWOOD_SYNC_DEBOUNCE_MS` - Cart debounce quiet window (default: 800)
//! - `DRIFTWOOD_GUEST_TOKEN_FILE` - Durable guest token location
//!   (default: .driftwood/guest-token)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default cart debounce quiet window, in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 800;

/// Default durable guest token location, relative to the working directory.
pub const DEFAULT_GUEST_TOKEN_FILE: &str = ".driftwood/guest-token";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Sync engine configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the persistence service.
    pub api_base_url: Url,
    /// Debounce quiet window for cart writes.
    pub debounce: Duration,
    /// Durable guest token location. `None` keeps the token in memory only.
    pub guest_token_file: Option<PathBuf>,
}

impl SyncConfig {
    /// Create a configuration for the given service URL.
    ///
    /// Uses the default debounce window and keeps the guest token in memory
    /// only; embedders that want a durable token set
    /// [`with_guest_token_file`](Self::with_guest_token_file).
    #[must_use]
    pub const fn new(api_base_url: Url) -> Self {
        Self {
            api_base_url,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            guest_token_file: None,
        }
    }

    /// Override the debounce quiet window.
    #[must_use]
    pub const fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Override the durable guest token location.
    #[must_use]
    pub fn with_guest_token_file(mut self, path: Option<PathBuf>) -> Self {
        self.guest_token_file = path;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_base_url = parse_base_url(&get_required_env("DRIFTWOOD_API_BASE_URL")?)?;
        let debounce_ms = match get_optional_env("DRIFTWOOD_SYNC_DEBOUNCE_MS") {
            Some(raw) => parse_debounce_ms(&raw)?,
            None => DEFAULT_DEBOUNCE_MS,
        };
        let guest_token_file = get_env_or_default("DRIFTWOOD_GUEST_TOKEN_FILE", DEFAULT_GUEST_TOKEN_FILE);

        Ok(Self {
            api_base_url,
            debounce: Duration::from_millis(debounce_ms),
            guest_token_file: Some(PathBuf::from(guest_token_file)),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse and validate the service base URL.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw)
        .map_err(|e| ConfigError::InvalidEnvVar("DRIFTWOOD_API_BASE_URL".to_string(), e.to_string()))
}

/// Parse the debounce window override.
fn parse_debounce_ms(raw: &str) -> Result<u64, ConfigError> {
    raw.parse::<u64>().map_err(|e| {
        ConfigError::InvalidEnvVar("DRIFTWOOD_SYNC_DEBOUNCE_MS".to_string(), e.to_string())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_url_valid() {
        let url = parse_base_url("https://api.driftwoodsupply.co").unwrap();
        assert_eq!(url.scheme(), "https");
    }

    #[test]
    fn test_parse_base_url_invalid() {
        let result = parse_base_url("not a url");
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(_, _))));
    }

    #[test]
    fn test_parse_debounce_ms() {
        assert_eq!(parse_debounce_ms("250").unwrap(), 250);
        assert!(parse_debounce_ms("soon").is_err());
    }

    #[test]
    fn test_new_uses_defaults() {
        let config = SyncConfig::new(Url::parse("http://localhost:4000").unwrap());
        assert_eq!(config.debounce, Duration::from_millis(DEFAULT_DEBOUNCE_MS));
        assert!(config.guest_token_file.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let config = SyncConfig::new(Url::parse("http://localhost:4000").unwrap())
            .with_debounce(Duration::from_millis(50))
            .with_guest_token_file(Some(PathBuf::from("/tmp/token")));
        assert_eq!(config.debounce, Duration::from_millis(50));
        assert_eq!(config.guest_token_file, Some(PathBuf::from("/tmp/token")));
    }
}
