//! Refresh-token exchange with the commerce GraphQL API.

use futures::future::BoxFuture;
use graphql_client::{QueryBody, Response};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

use imported_core::{BearerToken, RefreshToken, SessionUser};

use crate::error::SessionError;

const REFRESH_AUTH_TOKEN: &str = r"
mutation RefreshAuthToken($refreshToken: String!) {
  refreshToken(input: { refreshToken: $refreshToken }) {
    authToken
    success
  }
}
";

/// Result of a refresh exchange.
///
/// WPGraphQL only returns a new auth token; gateways that rotate the
/// refresh token or echo the profile fill the optional fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedTokens {
    pub auth_token: BearerToken,
    pub refresh_token: Option<RefreshToken>,
    pub user: Option<SessionUser>,
}

impl RefreshedTokens {
    #[must_use]
    pub const fn auth_only(auth_token: BearerToken) -> Self {
        Self {
            auth_token,
            refresh_token: None,
            user: None,
        }
    }
}

/// Exchanges a refresh token for a new auth token.
pub trait RefreshGateway: Send + Sync {
    /// # Errors
    ///
    /// Returns an error on transport failure, GraphQL errors, or when the
    /// response carries no usable auth token.
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a RefreshToken,
    ) -> BoxFuture<'a, Result<RefreshedTokens, SessionError>>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshVariables<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshData {
    refresh_token: Option<RefreshPayload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshPayload {
    auth_token: Option<BearerToken>,
    #[serde(default)]
    refresh_token: Option<RefreshToken>,
    #[serde(default)]
    user: Option<SessionUser>,
}

/// [`RefreshGateway`] over the `refreshToken` GraphQL mutation.
#[derive(Clone)]
pub struct GraphqlRefreshGateway {
    client: reqwest::Client,
    endpoint: Url,
}

impl GraphqlRefreshGateway {
    #[must_use]
    pub const fn new(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    async fn exchange(&self, refresh_token: &RefreshToken) -> Result<RefreshedTokens, SessionError> {
        let body = QueryBody {
            variables: RefreshVariables {
                refresh_token: refresh_token.expose(),
            },
            query: REFRESH_AUTH_TOKEN,
            operation_name: "RefreshAuthToken",
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        let parsed: Response<RefreshData> = serde_json::from_str(&text).map_err(|_| {
            SessionError::invalid_body(&format!("refresh returned {status}"), &text)
        })?;

        if let Some(error) = parsed.errors.as_deref().and_then(<[_]>::first) {
            return Err(SessionError::GraphQL(error.message.clone()));
        }

        let payload = parsed
            .data
            .and_then(|d| d.refresh_token)
            .ok_or_else(|| SessionError::InvalidResponse("refreshToken payload missing".into()))?;

        let auth_token = payload
            .auth_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SessionError::InvalidResponse("refreshToken.authToken missing".into()))?;

        Ok(RefreshedTokens {
            auth_token,
            refresh_token: payload.refresh_token.filter(|t| !t.is_empty()),
            user: payload.user,
        })
    }
}

impl RefreshGateway for GraphqlRefreshGateway {
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a RefreshToken,
    ) -> BoxFuture<'a, Result<RefreshedTokens, SessionError>> {
        Box::pin(self.exchange(refresh_token))
    }
}
