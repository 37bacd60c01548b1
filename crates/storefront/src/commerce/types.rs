//! Variables and response data for the commerce mutations.

use serde::{Deserialize, Serialize};

use imported_core::{AuthPayload, SessionUser};

// ─────────────────────────────────────────────────────────────────────────────
// Variables
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(super) struct LoginVariables<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct RegisterVariables<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct PasswordResetVariables<'a> {
    pub username: &'a str,
}

// ─────────────────────────────────────────────────────────────────────────────
// Response data
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(super) struct LoginData {
    pub login: Option<AuthPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RegisterData {
    pub register_user: Option<RegisterUserResult>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RegisterUserResult {
    pub user: Option<SessionUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PasswordResetData {
    #[allow(dead_code)]
    pub send_password_reset_email: Option<serde_json::Value>,
}
