//! Client side of the storefront's `/api/login` and `/api/signup` endpoints.

use serde::Deserialize;
use serde_json::json;
use tracing::instrument;
use url::Url;

use imported_core::AuthPayload;

use crate::error::SessionError;
use crate::store::{SessionSnapshot, SessionStore};

#[derive(Deserialize)]
struct DataEnvelope {
    data: AuthPayload,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: String,
}

/// Signs in through the storefront and records the result in a
/// [`SessionStore`].
#[derive(Clone)]
pub struct AccountClient {
    http: reqwest::Client,
    base_url: Url,
    store: SessionStore,
}

impl AccountClient {
    #[must_use]
    pub const fn new(http: reqwest::Client, base_url: Url, store: SessionStore) -> Self {
        Self {
            http,
            base_url,
            store,
        }
    }

    #[must_use]
    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Log in with username (or email) and password.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Rejected` with the storefront's message when the
    /// credentials are refused, other variants on transport failure.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionSnapshot, SessionError> {
        let body = json!({ "username": username, "password": password });
        self.authenticate("api/login", &body).await
    }

    /// Create an account from an email address and log into it. The
    /// storefront emails a link for choosing a password.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Rejected` when the storefront refuses the
    /// signup.
    #[instrument(skip(self))]
    pub async fn signup(&self, email: &str) -> Result<SessionSnapshot, SessionError> {
        self.authenticate("api/signup", &json!({ "email": email })).await
    }

    /// Forget the session locally. Tokens are not revoked upstream.
    pub fn logout(&self) -> SessionSnapshot {
        tracing::info!("Logging out");
        self.store.clear_session()
    }

    async fn authenticate(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<SessionSnapshot, SessionError> {
        let url = self.base_url.join(path)?;
        let response = self.http.post(url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error)
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or("error").to_string());
            tracing::debug!(status = status.as_u16(), message = %message, "Storefront rejected request");
            return Err(SessionError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: DataEnvelope = serde_json::from_str(&text)
            .map_err(|_| SessionError::invalid_body("unexpected success body", &text))?;
        Ok(self.store.set_session(envelope.data))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::gateway::GraphqlRefreshGateway;
    use crate::storage::{AUTH_TOKEN_KEY, MemoryStorage, SessionStorage};
    use crate::store::SessionStatus;

    fn client_for(server: &MockServer, storage: Arc<MemoryStorage>) -> AccountClient {
        let base = Url::parse(&format!("{}/", server.uri())).unwrap();
        let gateway = GraphqlRefreshGateway::new(reqwest::Client::new(), base.join("graphql").unwrap());
        let store = SessionStore::new(storage, Arc::new(gateway));
        store.hydrate();
        AccountClient::new(reqwest::Client::new(), base, store)
    }

    #[tokio::test]
    async fn test_login_sets_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/login"))
            .and(body_json(json!({ "username": "shopper", "password": "secret" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "authToken": "T1", "refreshToken": "R1", "user": { "username": "shopper" } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let storage = Arc::new(MemoryStorage::new());
        let client = client_for(&server, storage.clone());
        let snapshot = client.login("shopper", "secret").await.unwrap();

        assert_eq!(snapshot.status, SessionStatus::Authenticated);
        assert_eq!(storage.get(AUTH_TOKEN_KEY).unwrap().as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn test_login_rejected_keeps_session_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/login"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "error": "Invalid password" })),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemoryStorage::new()));
        let err = client.login("shopper", "wrong").await.unwrap_err();

        assert!(matches!(
            err,
            SessionError::Rejected { status: 401, ref message } if message == "Invalid password"
        ));
        assert_eq!(client.store().status(), SessionStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_signup_and_logout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/signup"))
            .and(body_json(json!({ "email": "new@example.com" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "authToken": "T1", "refreshToken": "R1" }
            })))
            .mount(&server)
            .await;

        let storage = Arc::new(MemoryStorage::new());
        let client = client_for(&server, storage.clone());
        assert!(client.signup("new@example.com").await.unwrap().is_authenticated());

        let snapshot = client.logout();
        assert_eq!(snapshot.status, SessionStatus::Unauthenticated);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_non_json_error_uses_reason_phrase() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let err = client_for(&server, Arc::new(MemoryStorage::new()))
            .signup("new@example.com")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Rejected { status: 429, ref message } if message == "Too Many Requests"
        ));
    }
}
