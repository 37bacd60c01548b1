//! Client-side session configuration.

use std::time::Duration;

use url::Url;

use crate::client::RetryPolicy;
use crate::keepalive::DEFAULT_KEEPALIVE_INTERVAL;

/// Settings for wiring a [`crate::SessionStore`] to real endpoints.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Commerce GraphQL endpoint used for token refresh.
    pub graphql_endpoint: Url,
    /// Storefront base URL serving `/api/login` and `/api/signup`.
    pub storefront_url: Url,
    /// How often the keep-alive task refreshes the auth token.
    pub keepalive_interval: Duration,
    /// When [`crate::AuthenticatedClient`] refreshes and replays.
    pub retry: RetryPolicy,
    /// Timeout for every request the session layer sends.
    pub request_timeout: Duration,
}

/// Request timeout in seconds, matching the storefront's upstream timeout.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

impl SessionConfig {
    /// Defaults for everything except the two endpoints.
    #[must_use]
    pub fn new(storefront_url: Url, graphql_endpoint: Url) -> Self {
        Self {
            graphql_endpoint,
            storefront_url: with_trailing_slash(storefront_url),
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// HTTP client with this configuration's timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .user_agent(concat!("imported-session/", env!("CARGO_PKG_VERSION")))
            .build()
    }
}

/// `Url::join` replaces the last path segment unless the base ends in `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
