//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//!
//! - `MIRACLE_API_BASE_URL` - Backend base URL (default: `http://127.0.0.1:8000`)
//! - `MIRACLE_API_TIMEOUT_SECS` - Blanket request timeout (default: 10)
//! - `MIRACLE_STATE_DIR` - Directory for the guest cart and tokens (default: `.miracle`)
//! - `MIRACLE_CATALOG_CACHE_TTL_SECS` - Catalog cache lifetime (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_STATE_DIR: &str = ".miracle";
const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Backend API settings
    pub api: ApiConfig,
    /// Where persistent client state (guest cart, tokens) lives
    pub state_dir: PathBuf,
    /// Lifetime of cached catalog responses
    pub catalog_cache_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Backend REST API settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL every endpoint path is joined onto
    pub base_url: Url,
    /// Timeout applied to every request
    pub timeout: Duration,
}

impl ApiConfig {
    /// API settings for a base URL with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL does not parse.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url("MIRACLE_API_BASE_URL", base_url)?,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let base_url = parse_base_url(
            "MIRACLE_API_BASE_URL",
            &get("MIRACLE_API_BASE_URL", DEFAULT_BASE_URL),
        )?;
        let timeout = parse_secs(
            "MIRACLE_API_TIMEOUT_SECS",
            lookup("MIRACLE_API_TIMEOUT_SECS"),
            DEFAULT_TIMEOUT_SECS,
        )?;
        let catalog_cache_ttl = parse_secs(
            "MIRACLE_CATALOG_CACHE_TTL_SECS",
            lookup("MIRACLE_CATALOG_CACHE_TTL_SECS"),
            DEFAULT_CACHE_TTL_SECS,
        )?;

        Ok(Self {
            api: ApiConfig { base_url, timeout },
            state_dir: PathBuf::from(get("MIRACLE_STATE_DIR", DEFAULT_STATE_DIR)),
            catalog_cache_ttl,
            sentry_dsn: lookup("SENTRY_DSN").filter(|s| !s.is_empty()),
            sentry_environment: lookup("SENTRY_ENVIRONMENT").filter(|s| !s.is_empty()),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse a base URL, requiring an http(s) scheme.
fn parse_base_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    Ok(url)
}

/// Parse a whole number of seconds, falling back to a default when unset.
fn parse_secs(key: &str, value: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    let secs = match value {
        Some(v) => v
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?,
        None => default,
    };
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = StorefrontConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.api.base_url.as_str(), "http://127.0.0.1:8000/");
        assert_eq!(config.api.timeout, Duration::from_secs(10));
        assert_eq!(config.state_dir, PathBuf::from(".miracle"));
        assert_eq!(config.catalog_cache_ttl, Duration::from_secs(300));
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = StorefrontConfig::from_lookup(lookup_from(&[
            ("MIRACLE_API_BASE_URL", "https://api.miracle.test"),
            ("MIRACLE_API_TIMEOUT_SECS", "3"),
            ("MIRACLE_STATE_DIR", "/tmp/miracle"),
            ("SENTRY_DSN", ""),
        ]))
        .unwrap();
        assert_eq!(config.api.base_url.host_str(), Some("api.miracle.test"));
        assert_eq!(config.api.timeout, Duration::from_secs(3));
        assert_eq!(config.state_dir, PathBuf::from("/tmp/miracle"));
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_invalid_timeout() {
        let err = StorefrontConfig::from_lookup(lookup_from(&[(
            "MIRACLE_API_TIMEOUT_SECS",
            "soon",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "MIRACLE_API_TIMEOUT_SECS"));
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        assert!(ApiConfig::new("ftp://example.com").is_err());
        assert!(ApiConfig::new("not a url").is_err());
        assert!(ApiConfig::new("http://localhost:8000").is_ok());
    }
}
