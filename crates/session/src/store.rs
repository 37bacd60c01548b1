//! The session store: single source of truth for the current credentials.
//!
//! State lives behind a `std::sync::RwLock` that is never held across an
//! await. Every change is persisted through the [`SessionStorage`] port and
//! published on a `watch` channel.
//!
//! Refreshes are single-flight: [`SessionStore::refresh_session`] and
//! [`SessionStore::ensure_fresh_token`] hand every concurrent caller the same
//! shared future, so at most one refresh request is in flight at a time.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use imported_core::{AuthPayload, BearerToken, RefreshToken, SessionUser};

use crate::gateway::{RefreshGateway, RefreshedTokens};
use crate::storage::{AUTH_TOKEN_KEY, REFRESH_TOKEN_KEY, SessionStorage, USER_KEY};

type RefreshFlight = Shared<BoxFuture<'static, Option<BearerToken>>>;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Storage has not been read yet.
    Loading,
    Authenticated,
    Unauthenticated,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Loading => "loading",
            Self::Authenticated => "authenticated",
            Self::Unauthenticated => "unauthenticated",
        })
    }
}

/// Point-in-time view of the session, as published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub auth_token: Option<BearerToken>,
    pub refresh_token: Option<RefreshToken>,
    pub user: Option<SessionUser>,
    pub is_refreshing: bool,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

impl SessionSnapshot {
    const fn loading() -> Self {
        Self {
            status: SessionStatus::Loading,
            auth_token: None,
            refresh_token: None,
            user: None,
            is_refreshing: false,
            last_refreshed_at: None,
        }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self.status, SessionStatus::Authenticated)
    }
}

/// Replacement values for [`SessionStore::set_session`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionUpdate {
    pub auth_token: Option<BearerToken>,
    pub refresh_token: Option<RefreshToken>,
    pub user: Option<SessionUser>,
}

impl From<AuthPayload> for SessionUpdate {
    fn from(payload: AuthPayload) -> Self {
        Self {
            auth_token: Some(payload.auth_token),
            refresh_token: payload.refresh_token,
            user: payload.user,
        }
    }
}

#[derive(Debug)]
struct SessionState {
    hydrated: bool,
    auth_token: Option<BearerToken>,
    refresh_token: Option<RefreshToken>,
    user: Option<SessionUser>,
    refreshes_running: usize,
    last_refreshed_at: Option<DateTime<Utc>>,
}

impl SessionState {
    fn status(&self) -> SessionStatus {
        match (self.hydrated, &self.auth_token) {
            (false, _) => SessionStatus::Loading,
            (true, Some(_)) => SessionStatus::Authenticated,
            (true, None) => SessionStatus::Unauthenticated,
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status(),
            auth_token: self.auth_token.clone(),
            refresh_token: self.refresh_token.clone(),
            user: self.user.clone(),
            is_refreshing: self.refreshes_running > 0,
            last_refreshed_at: self.last_refreshed_at,
        }
    }
}

/// Client-side session store.
///
/// Cheap to clone; clones share state, storage and the refresh slot.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    state: RwLock<SessionState>,
    storage: Arc<dyn SessionStorage>,
    gateway: Arc<dyn RefreshGateway>,
    updates: watch::Sender<SessionSnapshot>,
    in_flight: Mutex<Option<RefreshFlight>>,
}

impl SessionStore {
    /// Create an empty store in the `loading` state. Call [`Self::hydrate`]
    /// to load what was persisted.
    #[must_use]
    pub fn new(storage: Arc<dyn SessionStorage>, gateway: Arc<dyn RefreshGateway>) -> Self {
        let (updates, _) = watch::channel(SessionSnapshot::loading());
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(SessionState {
                    hydrated: false,
                    auth_token: None,
                    refresh_token: None,
                    user: None,
                    refreshes_running: 0,
                    last_refreshed_at: None,
                }),
                storage,
                gateway,
                updates,
                in_flight: Mutex::new(None),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn flight_slot(&self) -> MutexGuard<'_, Option<RefreshFlight>> {
        self.inner.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &SessionState) {
        self.inner.updates.send_replace(state.snapshot());
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.read().snapshot()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.read().status()
    }

    #[must_use]
    pub fn auth_token(&self) -> Option<BearerToken> {
        self.read().auth_token.clone()
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<RefreshToken> {
        self.read().refresh_token.clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<SessionUser> {
        self.read().user.clone()
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.read().refreshes_running > 0
    }

    #[must_use]
    pub fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.read().last_refreshed_at
    }

    /// Receive a snapshot after every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.updates.subscribe()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Load the persisted session. Only the first call reads storage; later
    /// calls (or calls after a `set_session`) return the current snapshot.
    pub fn hydrate(&self) -> SessionSnapshot {
        let mut state = self.write();
        if state.hydrated {
            return state.snapshot();
        }

        let storage = &self.inner.storage;
        state.auth_token = read_key(storage.as_ref(), AUTH_TOKEN_KEY)
            .map(BearerToken::from)
            .filter(|t| !t.is_empty());
        state.refresh_token = read_key(storage.as_ref(), REFRESH_TOKEN_KEY)
            .map(RefreshToken::from)
            .filter(|t| !t.is_empty());
        state.user = read_key(storage.as_ref(), USER_KEY).and_then(|raw| {
            serde_json::from_str::<SessionUser>(&raw)
                .inspect_err(|e| tracing::warn!(error = %e, "Unable to parse stored user"))
                .ok()
        });
        state.hydrated = true;

        tracing::debug!(status = %state.status(), "Session hydrated");
        self.publish(&state);
        state.snapshot()
    }

    /// Replace the whole session and persist it.
    ///
    /// Absent values remove their storage key. Status follows from whether an
    /// auth token is present.
    pub fn set_session(&self, update: impl Into<SessionUpdate>) -> SessionSnapshot {
        let update = update.into();
        let mut state = self.write();

        state.hydrated = true;
        state.auth_token = update.auth_token.filter(|t| !t.is_empty());
        state.refresh_token = update.refresh_token.filter(|t| !t.is_empty());
        state.user = update.user;

        self.persist(&state);
        tracing::debug!(status = %state.status(), "Session updated");
        self.publish(&state);
        state.snapshot()
    }

    /// Forget everything: tokens, profile and persisted keys.
    pub fn clear_session(&self) -> SessionSnapshot {
        self.set_session(SessionUpdate::default())
    }

    fn persist(&self, state: &SessionState) {
        let storage = self.inner.storage.as_ref();
        write_key(storage, AUTH_TOKEN_KEY, state.auth_token.as_ref().map(BearerToken::expose));
        write_key(
            storage,
            REFRESH_TOKEN_KEY,
            state.refresh_token.as_ref().map(RefreshToken::expose),
        );

        let user_json = state.user.as_ref().and_then(|user| {
            serde_json::to_string(user)
                .inspect_err(|e| tracing::warn!(error = %e, "Unable to serialize user"))
                .ok()
        });
        write_key(storage, USER_KEY, user_json.as_deref());
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// Exchange the refresh token for a new auth token.
    ///
    /// Without a refresh token this is a hard logout: the session is cleared
    /// and no request is made. Any failure also clears the session. A rotated
    /// refresh token or profile returned by the gateway is adopted; otherwise
    /// the held values are kept.
    ///
    /// Joins a refresh already in flight instead of starting a second one.
    pub async fn refresh_session(&self) -> Option<BearerToken> {
        if self.refresh_token().is_none() {
            tracing::debug!("No refresh token held, clearing session");
            self.clear_session();
            return None;
        }

        self.join_flight().await
    }

    /// Return a freshly refreshed auth token, joining a refresh already in
    /// flight if there is one.
    ///
    /// Returns `None` without touching the session when no refresh token is
    /// held, and `None` (with the session cleared) when the refresh fails.
    pub async fn ensure_fresh_token(&self) -> Option<BearerToken> {
        if self.refresh_token().is_none() {
            return None;
        }

        self.join_flight().await
    }

    /// The shared refresh future, started if none is in flight.
    ///
    /// The exchange runs on its own task, so it completes (and releases the
    /// slot) even when every waiter gives up on it.
    fn join_flight(&self) -> RefreshFlight {
        let mut slot = self.flight_slot();
        if let Some(flight) = slot.as_ref() {
            tracing::debug!("Joining refresh already in flight");
            return flight.clone();
        }

        let store = self.clone();
        let task = tokio::spawn(async move { store.refresh_once().await });
        let flight = async move {
            task.await.unwrap_or_else(|e| {
                tracing::error!(error = %e, "Refresh task failed");
                None
            })
        }
        .boxed()
        .shared();

        *slot = Some(flight.clone());
        flight
    }

    /// One exchange with the gateway. Only ever run as the body of a flight.
    async fn refresh_once(&self) -> Option<BearerToken> {
        let guard = RefreshGuard::begin(self);

        // Cleared between joining and starting
        let refresh_token = self.refresh_token()?;

        let result = self.inner.gateway.refresh(&refresh_token).await;
        guard.finish(&refresh_token, result)
    }

    fn finish_refresh(
        &self,
        used: &RefreshToken,
        result: Result<RefreshedTokens, crate::SessionError>,
    ) -> Option<BearerToken> {
        let mut state = self.write();
        state.refreshes_running = state.refreshes_running.saturating_sub(1);

        // A login or logout while the request was out wins over its result
        if state.refresh_token.as_ref() != Some(used) {
            tracing::debug!("Session replaced during refresh, discarding result");
            self.publish(&state);
            return state.auth_token.clone();
        }

        match result {
            Ok(tokens) if !tokens.auth_token.is_empty() => {
                state.auth_token = Some(tokens.auth_token);
                if let Some(rotated) = tokens.refresh_token.filter(|t| !t.is_empty()) {
                    state.refresh_token = Some(rotated);
                }
                if let Some(update) = tokens.user {
                    state.user = Some(state.user.take().unwrap_or_default().merge(update));
                }
                state.last_refreshed_at = Some(Utc::now());

                self.persist(&state);
                tracing::info!("Auth token refreshed");
                self.publish(&state);
                state.auth_token.clone()
            }
            Ok(_) => {
                tracing::warn!("Refresh returned an empty auth token, clearing session");
                self.clear_locked(&mut state);
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to refresh token, clearing session");
                self.clear_locked(&mut state);
                None
            }
        }
    }

    fn clear_locked(&self, state: &mut SessionState) {
        state.auth_token = None;
        state.refresh_token = None;
        state.user = None;
        self.persist(state);
        self.publish(state);
    }
}

/// Marks a refresh as running for as long as it lives.
///
/// Dropping it unsettled (no refresh token, or the task was aborted) lowers
/// the running count. Either way the flight slot is released.
struct RefreshGuard<'a> {
    store: &'a SessionStore,
    settled: bool,
}

impl<'a> RefreshGuard<'a> {
    fn begin(store: &'a SessionStore) -> Self {
        let mut state = store.write();
        state.refreshes_running += 1;
        store.publish(&state);
        Self {
            store,
            settled: false,
        }
    }

    /// Apply the gateway's answer; [`SessionStore::finish_refresh`] lowers
    /// the running count in the same write.
    fn finish(
        mut self,
        used: &RefreshToken,
        result: Result<RefreshedTokens, crate::SessionError>,
    ) -> Option<BearerToken> {
        self.settled = true;
        self.store.finish_refresh(used, result)
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.store.flight_slot().take();
        if !self.settled {
            let mut state = self.store.write();
            state.refreshes_running = state.refreshes_running.saturating_sub(1);
            self.store.publish(&state);
        }
    }
}

fn read_key(storage: &dyn SessionStorage, key: &str) -> Option<String> {
    storage
        .get(key)
        .inspect_err(|e| tracing::warn!(key, error = %e, "Failed to read session storage"))
        .ok()
        .flatten()
}

fn write_key(storage: &dyn SessionStorage, key: &str, value: Option<&str>) {
    let result = match value {
        Some(value) => storage.set(key, value),
        None => storage.remove(key),
    };
    if let Err(e) = result {
        tracing::warn!(key, error = %e, "Failed to write session storage");
    }
}
