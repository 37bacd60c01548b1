//! End-to-end tests for the Imported storefront session core.
//!
//! Each test gets a [`TestContext`]: a `wiremock` server standing in for the
//! WordPress GraphQL API and a real storefront bound to an ephemeral port
//! in front of it. Session clients are built against both.
//!
//! ```bash
//! cargo test -p imported-integration-tests
//! ```

#![allow(clippy::expect_used, clippy::missing_panics_doc)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use imported_session::{MemoryStorage, Session, SessionConfig, SessionStorage};
use imported_storefront::config::StorefrontConfig;
use imported_storefront::{AppState, serve};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// A running storefront wired to a mock upstream.
pub struct TestContext {
    pub upstream: MockServer,
    pub storefront_url: Url,
    pub graphql_endpoint: Url,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestContext {
    /// Start with auth rate limiting off.
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Start after adjusting the storefront configuration.
    pub async fn start_with(configure: impl FnOnce(&mut StorefrontConfig)) -> Self {
        let upstream = MockServer::start().await;
        let graphql_endpoint =
            Url::parse(&format!("{}/graphql", upstream.uri())).expect("mock server URI");

        let mut config = StorefrontConfig::for_endpoint(graphql_endpoint.clone());
        configure(&mut config);
        let state = AppState::new(config).expect("storefront state");

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");

        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(serve(listener, state, async move {
            let _ = rx.await;
        }));

        Self {
            upstream,
            storefront_url: Url::parse(&format!("http://{addr}/")).expect("storefront URL"),
            graphql_endpoint,
            shutdown: Some(tx),
        }
    }

    /// Absolute storefront URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> Url {
        self.storefront_url
            .join(path.trim_start_matches('/'))
            .expect("storefront path")
    }

    /// Absolute upstream URL for `path`.
    #[must_use]
    pub fn upstream_url(&self, path: &str) -> String {
        format!("{}{}", self.upstream.uri(), path)
    }

    /// Session client over fresh in-memory storage.
    #[must_use]
    pub fn session(&self) -> (Session, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        (self.session_over(storage.clone()), storage)
    }

    /// Session client over existing storage, as after a reload.
    #[must_use]
    pub fn session_over(&self, storage: Arc<dyn SessionStorage>) -> Session {
        let config = SessionConfig::new(self.storefront_url.clone(), self.graphql_endpoint.clone());
        Session::connect(&config, storage).expect("session client")
    }

    /// POST a raw JSON body to the storefront.
    pub async fn post_json(&self, path: &str, body: &str) -> (u16, Value) {
        let response = reqwest::Client::new()
            .post(self.url(path))
            .header("content-type", "application/json")
            .body(body.to_owned())
            .send()
            .await
            .expect("storefront request");
        let status = response.status().as_u16();
        let value = response.json().await.unwrap_or(Value::Null);
        (status, value)
    }

    /// Upstream requests for a GraphQL operation, in arrival order.
    pub async fn operations(&self, operation: &str) -> Vec<Value> {
        self.upstream
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|r: &Request| r.body_json::<Value>().ok())
            .filter(|body| body["operationName"] == operation)
            .collect()
    }

    /// Wait (up to two seconds) for a detached upstream call to land.
    pub async fn wait_for_operation(&self, operation: &str) -> Vec<Value> {
        for _ in 0..40 {
            let seen = self.operations(operation).await;
            if !seen.is_empty() {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Vec::new()
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

// =============================================================================
// Upstream stubs
// =============================================================================

/// `login` answers with the given token pair.
pub async fn mount_login(upstream: &MockServer, auth_token: &str, refresh_token: &str) {
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "operationName": "Login" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "login": {
                "authToken": auth_token,
                "refreshToken": refresh_token,
                "user": {
                    "id": "dXNlcjox",
                    "databaseId": 1,
                    "username": "shopper",
                    "email": "shopper@example.com",
                    "displayName": "Shop Per",
                    "roles": { "nodes": [{ "name": "customer" }] }
                }
            }}
        })))
        .mount(upstream)
        .await;
}

/// `refreshToken` answers with `auth_token` after `delay`, expecting
/// exactly `expected_calls` calls.
pub async fn mount_refresh(
    upstream: &MockServer,
    auth_token: &str,
    delay: Duration,
    expected_calls: u64,
) {
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "operationName": "RefreshAuthToken" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "data": { "refreshToken": { "authToken": auth_token, "success": true } }
                }))
                .set_delay(delay),
        )
        .expect(expected_calls)
        .mount(upstream)
        .await;
}
