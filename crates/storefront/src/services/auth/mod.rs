//! Authentication service.
//!
//! Exchanges credentials for tokens with the commerce API. Signup accepts
//! only an email: the service derives a username and a random password,
//! registers the account, logs straight into it and asks the upstream to
//! email a password reset link so the shopper can pick their own password.

mod error;

pub use error::AuthError;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};

use imported_core::{AuthPayload, Email};

use crate::commerce::{CommerceClient, CommerceError};
use crate::config::SignupConfig;

/// Shortest sanitized email local part used as a username base.
const MIN_USERNAME_BASE_LENGTH: usize = 3;

/// Random bytes in the username suffix (rendered as hex).
const USERNAME_SUFFIX_BYTES: usize = 2;

/// Random bytes in a generated password (rendered as unpadded base64url).
const PASSWORD_BYTES: usize = 12;

/// Authentication service.
pub struct AuthService<'a> {
    commerce: &'a CommerceClient,
    signup: &'a SignupConfig,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(commerce: &'a CommerceClient, signup: &'a SignupConfig) -> Self {
        Self { commerce, signup }
    }

    /// Login with username (or email) and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingCredentials` without contacting the
    /// upstream if either value is empty, `AuthError::LoginRejected` if the
    /// upstream refuses them.
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<AuthPayload, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.expose_secret().is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        self.commerce
            .login(username, password)
            .await
            .map_err(|e| reject_or_upstream(e, AuthError::LoginRejected))
    }

    /// Create an account for `email` and log into it.
    ///
    /// # Errors
    ///
    /// - `AuthError::MissingEmail` / `AuthError::InvalidEmail` before any
    ///   upstream call
    /// - `AuthError::RegistrationRejected` if the upstream refuses the account
    /// - `AuthError::AutoLoginFailed` if the account exists but the generated
    ///   credentials could not be exchanged for tokens
    pub async fn signup(&self, email: &str) -> Result<AuthPayload, AuthError> {
        if email.trim().is_empty() {
            return Err(AuthError::MissingEmail);
        }
        let email = Email::parse(email)?;
        let credentials = GeneratedCredentials::for_email(&email, &self.signup.username_fallback);

        self.commerce
            .register_user(&credentials.username, &email, &credentials.password)
            .await
            .map_err(|e| reject_or_upstream(e, AuthError::RegistrationRejected))?;

        tracing::info!(username = %credentials.username, "Registered account, logging in");

        let payload = self
            .commerce
            .login(&credentials.username, &credentials.password)
            .await
            .map_err(|e| reject_or_upstream(e, AuthError::AutoLoginFailed))?;

        spawn_password_reset(self.commerce.clone(), email);

        Ok(payload)
    }
}

/// Map upstream refusals to `rejected`, everything else to `Upstream`.
fn reject_or_upstream(err: CommerceError, rejected: fn(Option<String>) -> AuthError) -> AuthError {
    if err.is_rejection() {
        rejected(err.upstream_message().map(str::to_owned))
    } else {
        AuthError::Upstream(err)
    }
}

/// Send the password reset email on a detached task.
///
/// The signup response does not wait on it; failures are only logged.
fn spawn_password_reset(commerce: CommerceClient, email: Email) {
    tokio::spawn(async move {
        match commerce.send_password_reset(email.as_str()).await {
            Ok(()) => tracing::info!("Password reset email requested after signup"),
            Err(e) => tracing::warn!(error = %e, "Password reset trigger failed"),
        }
    });
}

// =============================================================================
// Credential derivation
// =============================================================================

/// Username and password generated for an email-only signup.
pub struct GeneratedCredentials {
    pub username: String,
    pub password: SecretString,
}

impl GeneratedCredentials {
    /// Derive fresh credentials for `email`.
    #[must_use]
    pub fn for_email(email: &Email, fallback: &str) -> Self {
        Self {
            username: generate_username(email, fallback),
            password: generate_password(),
        }
    }
}

/// Lowercased ASCII alphanumerics of the email local part, or `fallback`
/// when fewer than three survive.
#[must_use]
pub fn username_base(email: &Email, fallback: &str) -> String {
    let base: String = email
        .local_part()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if base.len() >= MIN_USERNAME_BASE_LENGTH {
        base
    } else {
        fallback.to_string()
    }
}

/// `<base>-<4 hex chars>`, e.g. `janedoe-3fa9`.
#[must_use]
pub fn generate_username(email: &Email, fallback: &str) -> String {
    let mut suffix = [0u8; USERNAME_SUFFIX_BYTES];
    rand::rng().fill(&mut suffix);
    let hex: String = suffix.iter().map(|b| format!("{b:02x}")).collect();
    format!("{}-{hex}", username_base(email, fallback))
}

/// 12 random bytes as unpadded base64url (16 characters).
#[must_use]
pub fn generate_password() -> SecretString {
    let mut bytes = [0u8; PASSWORD_BYTES];
    rand::rng().fill(&mut bytes);
    SecretString::from(URL_SAFE_NO_PAD.encode(bytes))
}
