//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Server-side failures are
//! captured to Sentry before the client sees a generic message; upstream
//! rejections pass the upstream's own message through.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::auth::AuthError;

/// Message for failures the client cannot act on.
const UNEXPECTED_ERROR: &str = "Unexpected error";

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Request body was not the JSON the endpoint expects.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// JSON error body: `{"error": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => match err {
                AuthError::MissingCredentials
                | AuthError::MissingEmail
                | AuthError::InvalidEmail(_)
                | AuthError::RegistrationRejected(_) => StatusCode::BAD_REQUEST,
                AuthError::LoginRejected(_) => StatusCode::UNAUTHORIZED,
                AuthError::AutoLoginFailed(_) | AuthError::Upstream(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// Message shown to the client.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::BadRequest(_) => "Invalid request body".to_string(),
            Self::Internal(_) => UNEXPECTED_ERROR.to_string(),
            Self::Auth(err) => match err {
                AuthError::MissingCredentials => "Username and password are required.".to_string(),
                AuthError::MissingEmail => "Email is required.".to_string(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::LoginRejected(msg) => upstream_or(msg.as_deref(), "Login failed"),
                AuthError::RegistrationRejected(msg) => {
                    upstream_or(msg.as_deref(), "Unable to create account.")
                }
                AuthError::AutoLoginFailed(msg) => {
                    upstream_or(msg.as_deref(), "Account created but login failed.")
                }
                AuthError::Upstream(_) => UNEXPECTED_ERROR.to_string(),
            },
        }
    }

    /// Whether this error indicates a fault on our side (or the upstream's
    /// transport) rather than a client or upstream decision.
    const fn is_server_fault(&self) -> bool {
        matches!(
            self,
            Self::Internal(_) | Self::Auth(AuthError::Upstream(_) | AuthError::AutoLoginFailed(_))
        )
    }
}

fn upstream_or(message: Option<&str>, fallback: &str) -> String {
    message.unwrap_or(fallback).to_string()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_fault() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let body = ErrorBody {
            error: self.client_message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for an auth action.
///
/// Breadcrumbs appear in Sentry reports to show what led up to an error.
pub fn add_breadcrumb(category: &str, message: &str) {
    sentry::add_breadcrumb(sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;
    use crate::commerce::CommerceError;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_errors_are_400() {
        let (status, body) = render(AuthError::MissingCredentials.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Username and password are required.");

        let (status, body) = render(AuthError::MissingEmail.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Email is required.");
    }

    #[tokio::test]
    async fn test_login_rejection_passes_upstream_message() {
        let err = AuthError::LoginRejected(Some("Wrong password".to_string()));
        let (status, body) = render(err.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Wrong password");

        let (_, body) = render(AuthError::LoginRejected(None).into()).await;
        assert_eq!(body["error"], "Login failed");
    }

    #[tokio::test]
    async fn test_signup_failure_fallbacks() {
        let (status, body) = render(AuthError::RegistrationRejected(None).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Unable to create account.");

        let (status, body) = render(AuthError::AutoLoginFailed(None).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Account created but login failed.");
    }

    #[tokio::test]
    async fn test_upstream_transport_error_is_generic() {
        let err = AuthError::Upstream(CommerceError::MissingData("login"));
        let (status, body) = render(err.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Unexpected error");
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::BadRequest("expected value".to_string());
        assert_eq!(err.to_string(), "Bad request: expected value");
    }
}
