//! Session commands.
//!
//! Each invocation hydrates the store from the session file, acts, and lets
//! the store write the result back.

#![allow(clippy::print_stdout)]

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use imported_session::{FileStorage, Session, SessionConfig, SessionError, SessionSnapshot};

/// Errors specific to the CLI front-end.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Session expired; log in again")]
    SessionExpired,

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// A hydrated session bound to a session file.
pub struct SessionContext {
    session: Session,
    file: PathBuf,
}

impl SessionContext {
    /// Open the session persisted at `file`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn open(storefront_url: Url, graphql_endpoint: Url, file: PathBuf) -> Result<Self, CommandError> {
        let config = SessionConfig::new(storefront_url, graphql_endpoint);
        let storage = Arc::new(FileStorage::new(file.clone()));
        let session = Session::connect(&config, storage)?;
        tracing::debug!(file = %file.display(), status = %session.store.status(), "Session loaded");
        Ok(Self { session, file })
    }
}

/// `session login`
pub async fn login(
    context: &SessionContext,
    username: &str,
    password: SecretString,
) -> Result<(), CommandError> {
    let snapshot = context
        .session
        .account
        .login(username, password.expose_secret())
        .await?;
    print_snapshot(&snapshot);
    tracing::info!(file = %context.file.display(), "Session saved");
    Ok(())
}

/// `session signup`
pub async fn signup(context: &SessionContext, email: &str) -> Result<(), CommandError> {
    let snapshot = context.session.account.signup(email).await?;
    print_snapshot(&snapshot);
    println!("Check {email} for a link to choose your password.");
    Ok(())
}

/// `session status`
pub fn status(context: &SessionContext) {
    print_snapshot(&context.session.store.snapshot());
}

/// `session refresh`
pub async fn refresh(context: &SessionContext) -> Result<(), CommandError> {
    let store = &context.session.store;
    if store.refresh_token().is_none() {
        return Err(CommandError::NotLoggedIn);
    }

    match store.ensure_fresh_token().await {
        Some(_) => {
            print_snapshot(&store.snapshot());
            Ok(())
        }
        None => Err(CommandError::SessionExpired),
    }
}

/// `session fetch`
pub async fn fetch(
    context: &SessionContext,
    method: &str,
    url: Url,
    data: Option<String>,
) -> Result<(), CommandError> {
    let method = parse_method(method)?;
    let client = &context.session.client;

    let mut request = client.request(method, url);
    if let Some(body) = data {
        request = request
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
    }

    let response = client.send(request).await?;
    let status = response.status();
    let body = response.text().await.map_err(SessionError::from)?;

    println!("HTTP {status}");
    println!("{body}");
    Ok(())
}

/// `session logout`
pub fn logout(context: &SessionContext) {
    context.session.account.logout();
    println!("Logged out.");
}

fn parse_method(method: &str) -> Result<Method, CommandError> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| CommandError::InvalidMethod(method.to_owned()))
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    println!("Status:        {}", snapshot.status);
    if let Some(user) = &snapshot.user {
        if let Some(label) = user.label() {
            println!("User:          {label}");
        }
        if let Some(roles) = user.roles.as_ref().filter(|r| !r.is_empty()) {
            println!("Roles:         {}", roles.join(", "));
        }
    }
    println!(
        "Refresh token: {}",
        if snapshot.refresh_token.is_some() { "held" } else { "none" }
    );
    if let Some(at) = snapshot.last_refreshed_at {
        println!("Refreshed at:  {}", at.to_rfc3339());
    }
}
