//! Imported storefront auth gateway library.
//!
//! Login and signup-with-autologin endpoints in front of the upstream
//! WordPress/WooCommerce GraphQL API. Exposed as a library so the binary and
//! the end-to-end tests run the same router.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;

pub mod commerce;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use routes::app;
pub use state::AppState;

/// Serve the storefront on `listener` until `shutdown` resolves.
///
/// Peer addresses are recorded so the auth rate limiter has a key even
/// when no proxy header is present.
///
/// # Errors
///
/// Returns an error if accepting connections fails.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}
