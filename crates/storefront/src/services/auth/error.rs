//! Authentication error types.

use thiserror::Error;

use crate::commerce::CommerceError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Username or password missing from the login form.
    #[error("username and password are required")]
    MissingCredentials,

    /// Email missing from the signup form.
    #[error("email is required")]
    MissingEmail,

    /// Email present but not an address.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] imported_core::EmailError),

    /// The commerce API refused the credentials.
    #[error("login rejected: {}", .0.as_deref().unwrap_or("no message"))]
    LoginRejected(Option<String>),

    /// The commerce API refused to create the account.
    #[error("registration rejected: {}", .0.as_deref().unwrap_or("no message"))]
    RegistrationRejected(Option<String>),

    /// The account was created but logging into it failed.
    #[error("account created but login failed: {}", .0.as_deref().unwrap_or("no message"))]
    AutoLoginFailed(Option<String>),

    /// Transport or parse failure talking to the commerce API.
    #[error("commerce API error: {0}")]
    Upstream(#[from] CommerceError),
}
