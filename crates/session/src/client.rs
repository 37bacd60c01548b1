//! HTTP client that attaches the session's bearer token and recovers from
//! an expired one.
//!
//! Wraps `reqwest::Client` explicitly: only requests sent through
//! [`AuthenticatedClient`] get the retry behaviour.

use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{IntoUrl, Method, Request, RequestBuilder, Response, StatusCode};
use tracing::debug;

use imported_core::BearerToken;

use crate::error::SessionError;
use crate::store::SessionStore;

/// When to refresh and replay a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Replays allowed per request.
    pub max_retries: u32,
    /// Response status that means "token expired".
    pub trigger: StatusCode,
}

impl Default for RetryPolicy {
    /// WPGraphQL answers an expired JWT with 403; replay once.
    fn default() -> Self {
        Self {
            max_retries: 1,
            trigger: StatusCode::FORBIDDEN,
        }
    }
}

/// `reqwest` wrapper bound to a [`SessionStore`].
#[derive(Clone)]
pub struct AuthenticatedClient {
    http: reqwest::Client,
    store: SessionStore,
    policy: RetryPolicy,
}

impl AuthenticatedClient {
    #[must_use]
    pub fn new(http: reqwest::Client, store: SessionStore) -> Self {
        Self::with_policy(http, store, RetryPolicy::default())
    }

    #[must_use]
    pub const fn with_policy(http: reqwest::Client, store: SessionStore, policy: RetryPolicy) -> Self {
        Self {
            http,
            store,
            policy,
        }
    }

    #[must_use]
    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Start a request; send it with [`Self::send`].
    pub fn request<U: IntoUrl>(&self, method: Method, url: U) -> RequestBuilder {
        self.http.request(method, url)
    }

    pub fn get<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    /// Build and send a request through [`Self::execute`].
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be built or sent.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, SessionError> {
        self.execute(builder.build()?).await
    }

    /// Send a request, replaying it with a refreshed token when the response
    /// status matches the policy trigger.
    ///
    /// The current auth token is attached unless the request already carries
    /// an `Authorization` header. The trigger response is returned unchanged
    /// when no refresh token is held, the refresh fails, or the body cannot be
    /// replayed (streams).
    ///
    /// # Errors
    ///
    /// Returns an error only for transport failures.
    pub async fn execute(&self, mut request: Request) -> Result<Response, SessionError> {
        if !request.headers().contains_key(AUTHORIZATION)
            && let Some(token) = self.store.auth_token()
            && let Some(value) = bearer_header(&token)
        {
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let mut attempt = 0;
        loop {
            let sent_with = request
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(BearerToken::from_header_value);
            let replay = if attempt < self.policy.max_retries {
                request.try_clone()
            } else {
                None
            };

            let response = self.http.execute(request).await?;
            if response.status() != self.policy.trigger || self.store.refresh_token().is_none() {
                return Ok(response);
            }

            let Some(mut next) = replay else {
                return Ok(response);
            };
            let Some(value) = self
                .fresh_token(sent_with.as_ref())
                .await
                .as_ref()
                .and_then(bearer_header)
            else {
                return Ok(response);
            };

            attempt += 1;
            debug!(
                status = %response.status(),
                url = %next.url(),
                attempt,
                "Replaying request with refreshed token"
            );
            next.headers_mut().insert(AUTHORIZATION, value);
            request = next;
        }
    }

    /// A token worth retrying with. If another request already refreshed
    /// while this one was in flight, reuse that token instead of refreshing
    /// again.
    async fn fresh_token(&self, sent_with: Option<&BearerToken>) -> Option<BearerToken> {
        match self.store.auth_token() {
            Some(current) if Some(&current) != sent_with => Some(current),
            _ => self.store.ensure_fresh_token().await,
        }
    }
}

fn bearer_header(token: &BearerToken) -> Option<HeaderValue> {
    let mut value = HeaderValue::from_str(&token.header_value()).ok()?;
    value.set_sensitive(true);
    Some(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::gateway::GraphqlRefreshGateway;
    use crate::storage::MemoryStorage;
    use crate::store::SessionUpdate;
    use imported_core::RefreshToken;

    fn store_for(server: &MockServer, refresh: Option<&str>) -> SessionStore {
        let gateway = GraphqlRefreshGateway::new(
            reqwest::Client::new(),
            Url::parse(&format!("{}/graphql", server.uri())).unwrap(),
        );
        let store = SessionStore::new(Arc::new(MemoryStorage::new()), Arc::new(gateway));
        store.set_session(SessionUpdate {
            auth_token: Some(BearerToken::new("T1")),
            refresh_token: refresh.map(RefreshToken::new),
            user: None,
        });
        store
    }

    async fn mount_refresh(server: &MockServer, token: &str, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_partial_json(json!({ "operationName": "RefreshAuthToken" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "refreshToken": { "authToken": token } }
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_attaches_current_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orders"))
            .and(header("authorization", "Bearer T1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = AuthenticatedClient::new(reqwest::Client::new(), store_for(&server, Some("R1")));
        let response = client
            .send(client.get(format!("{}/orders", server.uri())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_retries_403_once_with_refreshed_token() {
        let server = MockServer::start().await;
        mount_refresh(&server, "T2", 1).await;
        Mock::given(method("GET"))
            .and(path("/orders"))
            .and(header("authorization", "Bearer T1"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/orders"))
            .and(header("authorization", "Bearer T2"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server, Some("R1"));
        let client = AuthenticatedClient::new(reqwest::Client::new(), store.clone());
        let response = client
            .send(client.get(format!("{}/orders", server.uri())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.auth_token(), Some(BearerToken::new("T2")));
    }

    #[tokio::test]
    async fn test_second_403_is_returned_not_retried() {
        let server = MockServer::start().await;
        mount_refresh(&server, "T2", 1).await;
        Mock::given(method("GET"))
            .and(path("/admin"))
            .respond_with(ResponseTemplate::new(403))
            .expect(2)
            .mount(&server)
            .await;

        let client = AuthenticatedClient::new(reqwest::Client::new(), store_for(&server, Some("R1")));
        let response = client
            .send(client.get(format!("{}/admin", server.uri())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_no_refresh_token_returns_403_untouched() {
        let server = MockServer::start().await;
        mount_refresh(&server, "T2", 0).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server, None);
        let client = AuthenticatedClient::new(reqwest::Client::new(), store.clone());
        let response = client
            .send(client.get(format!("{}/orders", server.uri())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(store.auth_token(), Some(BearerToken::new("T1")));
    }

    #[tokio::test]
    async fn test_failed_refresh_returns_original_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{ "message": "Refresh token expired" }]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server, Some("R1"));
        let client = AuthenticatedClient::new(reqwest::Client::new(), store.clone());
        let response = client
            .send(client.get(format!("{}/orders", server.uri())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.text().await.unwrap(), "forbidden");
        assert!(store.auth_token().is_none());
    }

    #[tokio::test]
    async fn test_custom_trigger_status() {
        let server = MockServer::start().await;
        mount_refresh(&server, "T2", 1).await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer T1"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer T2"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = AuthenticatedClient::with_policy(
            reqwest::Client::new(),
            store_for(&server, Some("R1")),
            RetryPolicy {
                max_retries: 1,
                trigger: StatusCode::UNAUTHORIZED,
            },
        );
        let response = client
            .send(client.get(format!("{}/orders", server.uri())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
