//! Commerce GraphQL client implementation.

use std::sync::Arc;

use graphql_client::{QueryBody, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, instrument};

use imported_core::{AuthPayload, Email, SessionUser};

use super::mutations;
use super::types::{
    LoginData, LoginVariables, PasswordResetData, PasswordResetVariables, RegisterData,
    RegisterVariables,
};
use super::{CommerceError, GraphQLError};
use crate::config::CommerceConfig;

/// How much of an unreadable upstream body ends up in the logs.
const LOG_BODY_CHARS: usize = 500;

// =============================================================================
// CommerceClient
// =============================================================================

/// Client for the upstream commerce GraphQL API.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct CommerceClient {
    inner: Arc<CommerceClientInner>,
}

struct CommerceClientInner {
    client: reqwest::Client,
    endpoint: String,
}

impl CommerceClient {
    /// Create a new commerce API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &CommerceConfig) -> Result<Self, CommerceError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("imported-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(CommerceClientInner {
                client,
                endpoint: config.graphql_endpoint.to_string(),
            }),
        })
    }

    /// The GraphQL endpoint this client talks to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// Execute a GraphQL document and return its `data`.
    async fn execute<V, T>(&self, body: &QueryBody<V>) -> Result<T, CommerceError>
    where
        V: Serialize,
        T: DeserializeOwned,
    {
        let response = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            // WPGraphQL reports auth failures as 4xx with a GraphQL error body
            let message = serde_json::from_str::<Response<serde_json::Value>>(&response_text)
                .ok()
                .and_then(|r| r.errors)
                .and_then(|errors| errors.into_iter().next())
                .map(|e| e.message);

            tracing::warn!(
                status = %status,
                operation = body.operation_name,
                message = ?message,
                "Commerce API returned non-success status"
            );
            return Err(CommerceError::Status { status, message });
        }

        let response: Response<T> = match serde_json::from_str(&response_text) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    operation = body.operation_name,
                    body = %response_text.chars().take(LOG_BODY_CHARS).collect::<String>(),
                    "Failed to parse commerce GraphQL response"
                );
                return Err(CommerceError::Parse(e));
            }
        };

        if let Some(errors) = response.errors
            && !errors.is_empty()
        {
            debug!(errors = ?errors, operation = body.operation_name, "GraphQL errors in response");
            return Err(CommerceError::GraphQL(
                errors.into_iter().map(GraphQLError::from).collect(),
            ));
        }

        response
            .data
            .ok_or(CommerceError::MissingData("response data"))
    }

    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Exchange credentials for a token pair and user profile.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::GraphQL` or `CommerceError::Status` when the
    /// upstream refuses the credentials, other variants on transport failure.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<AuthPayload, CommerceError> {
        let body = QueryBody {
            variables: LoginVariables {
                username,
                password: password.expose_secret(),
            },
            query: mutations::LOGIN,
            operation_name: "Login",
        };

        let data: LoginData = self.execute(&body).await?;
        let payload = data.login.ok_or(CommerceError::MissingData("login"))?;

        if payload.auth_token.is_empty() {
            return Err(CommerceError::MissingData("login.authToken"));
        }

        Ok(payload)
    }

    /// Register a new customer account.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::GraphQL` when the upstream rejects the
    /// registration (e.g. the email is already taken).
    #[instrument(skip(self, password))]
    pub async fn register_user(
        &self,
        username: &str,
        email: &Email,
        password: &SecretString,
    ) -> Result<SessionUser, CommerceError> {
        let body = QueryBody {
            variables: RegisterVariables {
                username,
                email: email.as_str(),
                password: password.expose_secret(),
            },
            query: mutations::REGISTER_USER,
            operation_name: "RegisterUser",
        };

        let data: RegisterData = self.execute(&body).await?;
        Ok(data
            .register_user
            .and_then(|result| result.user)
            .unwrap_or_default())
    }

    /// Ask the upstream to send a password reset email.
    ///
    /// `username` may be the account's username or email address.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the upstream refuses it.
    #[instrument(skip(self))]
    pub async fn send_password_reset(&self, username: &str) -> Result<(), CommerceError> {
        let body = QueryBody {
            variables: PasswordResetVariables { username },
            query: mutations::SEND_PASSWORD_RESET,
            operation_name: "SendPasswordReset",
        };

        let _: PasswordResetData = self.execute(&body).await?;
        Ok(())
    }
}
