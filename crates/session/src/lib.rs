//! Client-side session for the Imported storefront.
//!
//! - [`SessionStore`]: current auth token, refresh token and profile,
//!   persisted through a [`SessionStorage`] port
//! - [`AuthenticatedClient`]: attaches the bearer token and replays a `403`
//!   once after a single-flight refresh
//! - [`SessionKeepAlive`]: refreshes proactively on a timer
//! - [`AccountClient`]: login, signup and logout against the storefront
//!
//! # Example
//!
//! ```rust,ignore
//! let config = SessionConfig::new(storefront_url, graphql_endpoint);
//! let session = Session::connect(&config, Arc::new(FileStorage::new("session.json")))?;
//! session.account.login("shopper", "secret").await?;
//! let orders = session.client.send(session.client.get(orders_url)).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

mod account;
mod client;
mod config;
mod error;
mod gateway;
mod keepalive;
pub mod storage;
mod store;

pub use account::AccountClient;
pub use client::{AuthenticatedClient, RetryPolicy};
pub use config::SessionConfig;
pub use error::{SessionError, StorageError};
pub use gateway::{GraphqlRefreshGateway, RefreshGateway, RefreshedTokens};
pub use keepalive::{DEFAULT_KEEPALIVE_INTERVAL, SessionKeepAlive};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
pub use store::{SessionSnapshot, SessionStatus, SessionStore, SessionUpdate};

/// A hydrated store with its clients, wired from a [`SessionConfig`].
#[derive(Clone)]
pub struct Session {
    pub store: SessionStore,
    pub client: AuthenticatedClient,
    pub account: AccountClient,
}

impl Session {
    /// Build the store over `storage`, hydrate it and attach the clients.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn connect(
        config: &SessionConfig,
        storage: Arc<dyn SessionStorage>,
    ) -> Result<Self, SessionError> {
        let http = config.http_client()?;
        let gateway = GraphqlRefreshGateway::new(http.clone(), config.graphql_endpoint.clone());
        let store = SessionStore::new(storage, Arc::new(gateway));
        store.hydrate();

        Ok(Self {
            client: AuthenticatedClient::with_policy(http.clone(), store.clone(), config.retry),
            account: AccountClient::new(http, config.storefront_url.clone(), store.clone()),
            store,
        })
    }

    /// Start the keep-alive timer for this session.
    #[must_use]
    pub fn keep_alive(&self, interval: std::time::Duration) -> SessionKeepAlive {
        SessionKeepAlive::spawn(self.store.clone(), interval)
    }
}
