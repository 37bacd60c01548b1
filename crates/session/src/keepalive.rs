//! Background task that refreshes the auth token before it expires.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::store::SessionStore;

/// WPGraphQL JWTs live for an hour; refresh a little before that.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(55 * 60);

/// Handle to the keep-alive task. Dropping it stops the task.
pub struct SessionKeepAlive {
    shutdown: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl SessionKeepAlive {
    /// Start refreshing every `interval` while the session is authenticated
    /// and holds a refresh token. The first refresh happens one interval
    /// after spawning. Must be called inside a tokio runtime.
    #[must_use]
    pub fn spawn(store: SessionStore, interval: Duration) -> Self {
        let shutdown = Arc::new(Notify::new());
        let first_tick = Instant::now() + interval;
        let handle = tokio::spawn(run(store, first_tick, interval, shutdown.clone()));
        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Stop the task and wait for it to finish.
    pub async fn shutdown(mut self) {
        self.shutdown.notify_one();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            tracing::warn!(error = %e, "Keep-alive task ended abnormally");
        }
    }
}

impl Drop for SessionKeepAlive {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn run(
    store: SessionStore,
    first_tick: Instant,
    interval: Duration,
    shutdown: Arc<Notify>,
) {
    tracing::debug!(interval_secs = interval.as_secs(), "Session keep-alive started");

    let mut ticker = tokio::time::interval_at(first_tick, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = shutdown.notified() => {
                tracing::debug!("Session keep-alive received shutdown signal");
                break;
            }
            _ = ticker.tick() => {
                let snapshot = store.snapshot();
                if !snapshot.is_authenticated() || snapshot.refresh_token.is_none() {
                    tracing::trace!(status = %snapshot.status, "Keep-alive idle");
                    continue;
                }

                match store.ensure_fresh_token().await {
                    Some(_) => tracing::debug!("Keep-alive refreshed auth token"),
                    None => tracing::info!("Keep-alive refresh failed, session cleared"),
                }
            }
        }
    }
}
