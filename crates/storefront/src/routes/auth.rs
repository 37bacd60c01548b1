//! Authentication route handlers.
//!
//! JSON endpoints the storefront's client calls to obtain a session. Both
//! return `{"data": AuthPayload}` on success and `{"error": "..."}` otherwise.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use imported_core::AuthPayload;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::state::AppState;

// =============================================================================
// Request / Response Types
// =============================================================================

/// Login request body.
///
/// Fields are optional so a missing field is a validation error with a
/// readable message rather than a deserialization failure.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Signup request body.
#[derive(Debug, Default, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: Option<String>,
}

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle `POST /api/login`.
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    body: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<DataResponse<AuthPayload>>> {
    let Json(request) = body.map_err(AppError::from)?;
    let username = request.username.unwrap_or_default();
    let password = SecretString::from(request.password.unwrap_or_default());

    let payload = state.auth().login(&username, &password).await?;

    add_breadcrumb("auth", "Login succeeded");
    tracing::info!(username = %username.trim(), "Customer logged in");

    Ok(Json(DataResponse { data: payload }))
}

/// Handle `POST /api/signup`.
///
/// Creates the account with generated credentials, logs into it and
/// triggers a password reset email in the background.
#[tracing::instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    body: std::result::Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Json<DataResponse<AuthPayload>>> {
    let Json(request) = body.map_err(AppError::from)?;
    let email = request.email.unwrap_or_default();

    let payload = state.auth().signup(&email).await?;

    add_breadcrumb("auth", "Signup succeeded");
    tracing::info!("Customer signed up");

    Ok(Json(DataResponse { data: payload }))
}
