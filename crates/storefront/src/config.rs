//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `COMMERCE_GRAPHQL_ENDPOINT` - Upstream commerce GraphQL endpoint
//!   (falls back to `WP_GRAPHQL_ENDPOINT`)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_RATE_LIMIT` - Rate limit auth endpoints (default: true)
//! - `COMMERCE_TIMEOUT_SECS` - Upstream request timeout (default: 30)
//! - `SIGNUP_USERNAME_FALLBACK` - Username base when the email local part is
//!   too short (default: imported)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Username base used when an email local part sanitizes to under 3 chars.
pub const DEFAULT_USERNAME_FALLBACK: &str = "imported";

/// Upstream request timeout in seconds.
/// 30s allows for a slow WordPress backend while failing fast enough for the form.
const DEFAULT_COMMERCE_TIMEOUT_SECS: u64 = 30;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Whether auth endpoints are rate limited per client IP
    pub rate_limit_auth: bool,
    /// Upstream commerce API configuration
    pub commerce: CommerceConfig,
    /// Signup credential derivation
    pub signup: SignupConfig,
    /// Sentry error tracking configuration
    pub sentry: SentryConfig,
}

/// Upstream commerce (WordPress GraphQL) API configuration.
#[derive(Debug, Clone)]
pub struct CommerceConfig {
    /// GraphQL endpoint URL
    pub graphql_endpoint: Url,
    /// Timeout applied to every upstream request
    pub timeout: Duration,
}

/// Signup configuration.
#[derive(Debug, Clone)]
pub struct SignupConfig {
    /// Username base used when the email local part is unusable
    pub username_fallback: String,
}

impl Default for SignupConfig {
    fn default() -> Self {
        Self {
            username_fallback: DEFAULT_USERNAME_FALLBACK.to_string(),
        }
    }
}

/// Sentry configuration.
#[derive(Debug, Clone)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.0,
        }
    }
}

impl StorefrontConfig {
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

        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;
        let rate_limit_auth = parse_env("STOREFRONT_RATE_LIMIT", "true")?;

        Ok(Self {
            host,
            port,
            rate_limit_auth,
            commerce: CommerceConfig::from_env()?,
            signup: SignupConfig {
                username_fallback: get_env_or_default(
                    "SIGNUP_USERNAME_FALLBACK",
                    DEFAULT_USERNAME_FALLBACK,
                ),
            },
            sentry: SentryConfig {
                dsn: get_optional_env("SENTRY_DSN"),
                environment: get_optional_env("SENTRY_ENVIRONMENT"),
                sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
                traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
            },
        })
    }

    /// Configuration for tests and embedding: local bind, no rate limiting,
    /// the given upstream endpoint.
    #[must_use]
    pub fn for_endpoint(graphql_endpoint: Url) -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            rate_limit_auth: false,
            commerce: CommerceConfig {
                graphql_endpoint,
                timeout: Duration::from_secs(DEFAULT_COMMERCE_TIMEOUT_SECS),
            },
            signup: SignupConfig::default(),
            sentry: SentryConfig::default(),
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl CommerceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw = get_env_with_fallback("COMMERCE_GRAPHQL_ENDPOINT", "WP_GRAPHQL_ENDPOINT")?;
        let graphql_endpoint = parse_endpoint("COMMERCE_GRAPHQL_ENDPOINT", &raw)?;
        let timeout_secs: u64 = parse_env(
            "COMMERCE_TIMEOUT_SECS",
            &DEFAULT_COMMERCE_TIMEOUT_SECS.to_string(),
        )?;

        Ok(Self {
            graphql_endpoint,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Get a required variable, accepting a legacy name as fallback.
fn get_env_with_fallback(primary_key: &str, fallback_key: &str) -> Result<String, ConfigError> {
    get_optional_env(primary_key)
        .or_else(|| get_optional_env(fallback_key))
        .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse an upstream endpoint, requiring an http(s) URL with a host.
fn parse_endpoint(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "missing host".to_string(),
        ));
    }

    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint_accepts_https() {
        let url = parse_endpoint("TEST", "https://shop.example/graphql").unwrap();
        assert_eq!(url.path(), "/graphql");
    }

    #[test]
    fn test_parse_endpoint_trims() {
        let url = parse_endpoint("TEST", "  http://localhost:8080/graphql \n").unwrap();
        assert_eq!(url.port(), Some(8080));
    }

    #[test]
    fn test_parse_endpoint_rejects_other_schemes() {
        let err = parse_endpoint("TEST", "ftp://shop.example/graphql").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "TEST"));
    }

    #[test]
    fn test_parse_endpoint_rejects_garbage() {
        assert!(parse_endpoint("TEST", "not a url").is_err());
    }

    #[test]
    fn test_for_endpoint_defaults() {
        let config =
            StorefrontConfig::for_endpoint(Url::parse("http://127.0.0.1:9/graphql").unwrap());
        assert!(!config.rate_limit_auth);
        assert_eq!(config.signup.username_fallback, DEFAULT_USERNAME_FALLBACK);
        assert_eq!(config.commerce.timeout, Duration::from_secs(30));
        assert!(config.sentry.dsn.is_none());
    }

    #[test]
    fn test_socket_addr() {
        let mut config =
            StorefrontConfig::for_endpoint(Url::parse("http://127.0.0.1:9/graphql").unwrap());
        config.port = 3000;

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }
}
