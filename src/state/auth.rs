//! Auth-session state for the current client user.
//!
//! SYSTEM CONTEXT
//! ==============
//! `AuthSession` is the one object consumers hold: it answers `current()` and
//! performs register/login/logout. It owns the cache, the redirect machine and
//! the API handle, and publishes [`Navigation`] commands on a channel that the
//! router side drains.
//!
//! ORDERING
//! ========
//! Every successful operation writes the cache before its navigation is sent,
//! so a view mounted at the destination never sees the previous state. Failed
//! operations write nothing.
//!
//! CONCURRENCY
//! ===========
//! The machine mutex is never held across an `.await`. Every redirect decision
//! reads the cache while holding it, and every cache write made by this type
//! happens under it, so the last navigation sent always matches the final
//! status. A fetch settles through `AuthCache::set_if_revision`, so an answer
//! that arrives after an operation already wrote the cache is dropped instead
//! of undoing it.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::cache::{AuthCache, CacheSnapshot};
use super::session::{Navigation, Route, SessionState, SessionStateMachine, SessionStatus, status_for_outcome};
use crate::net::api::SessionApi;
use crate::net::types::{AuthError, Credentials, FetchOutcome, User};

pub struct AuthSession {
    api: Arc<dyn SessionApi>,
    cache: AuthCache,
    machine: Mutex<SessionStateMachine>,
    nav_tx: mpsc::UnboundedSender<Navigation>,
}

impl AuthSession {
    /// Create a session positioned at `location`, plus the receiver on which
    /// navigation commands are delivered.
    pub fn new(
        api: Arc<dyn SessionApi>,
        location: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<Navigation>) {
        let (nav_tx, nav_rx) = mpsc::unbounded_channel();
        let session =
            Self { api, cache: AuthCache::new(), machine: Mutex::new(SessionStateMachine::new(location)), nav_tx };
        (session, nav_rx)
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Current `{ user, loading }` view. Never touches the network.
    #[must_use]
    pub fn current(&self) -> SessionState {
        self.status().state()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        SessionStatus::from(&self.cache.get())
    }

    #[must_use]
    pub fn cache(&self) -> &AuthCache {
        &self.cache
    }

    #[must_use]
    pub fn location(&self) -> String {
        self.lock_machine().location().to_owned()
    }

    /// Receiver woken whenever the cache changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CacheSnapshot> {
        self.cache.subscribe()
    }

    // =========================================================================
    // FETCH
    // =========================================================================

    /// Run the single-shot current-user fetch. A no-op once the session has
    /// left `Initializing`.
    pub async fn initialize(&self) -> SessionStatus {
        let snapshot = self.cache.snapshot();
        if !snapshot.entry.is_unknown() {
            tracing::debug!("session already settled; skipping current-user fetch");
            return SessionStatus::from(&snapshot.entry);
        }
        let outcome = self.api.fetch_current_user().await;
        self.settle_fetch(snapshot.revision, &outcome)
    }

    /// Run [`initialize`](Self::initialize) on a background task that holds
    /// only a weak reference. If every strong reference is dropped before the
    /// fetch settles, the result is discarded.
    pub fn spawn_initialize(session: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(session);
        let api = Arc::clone(&session.api);
        let snapshot = session.cache.snapshot();

        tokio::spawn(async move {
            if !snapshot.entry.is_unknown() {
                return;
            }
            let outcome = api.fetch_current_user().await;
            match weak.upgrade() {
                Some(session) => {
                    session.settle_fetch(snapshot.revision, &outcome);
                }
                None => tracing::debug!("session dropped before current-user fetch settled"),
            }
        })
    }

    /// Fetch the current user again. The session never returns to `Initializing`.
    pub async fn refresh(&self) -> SessionStatus {
        let revision = self.cache.revision();
        let outcome = self.api.fetch_current_user().await;
        self.settle_fetch(revision, &outcome)
    }

    fn settle_fetch(&self, revision: u64, outcome: &FetchOutcome) -> SessionStatus {
        match outcome {
            FetchOutcome::Success(user) => tracing::info!(user = %user.username, "session authenticated"),
            FetchOutcome::Unauthenticated => tracing::info!("no active session"),
            FetchOutcome::TransientError(detail) => {
                tracing::warn!(error = %detail, "current-user fetch failed; treating session as anonymous");
            }
        }

        let status = status_for_outcome(outcome);
        let mut machine = self.lock_machine();
        if !self.cache.set_if_revision(revision, status.into_user()) {
            tracing::debug!(revision, "discarding stale current-user fetch");
            return SessionStatus::from(&self.cache.get());
        }

        let current = SessionStatus::from(&self.cache.get());
        if let Some(navigation) = machine.observe(&current) {
            self.emit(navigation);
        }
        current
    }

    // =========================================================================
    // LOCATION
    // =========================================================================

    /// Report a router location change. Returns the redirect it caused, if any.
    pub fn set_location(&self, location: &str) -> Option<Navigation> {
        let mut machine = self.lock_machine();
        let status = SessionStatus::from(&self.cache.get());
        let navigation = machine.set_location(location, &status);
        if let Some(navigation) = navigation {
            self.emit(navigation);
        }
        navigation
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Create an account; on success behaves like [`login`](Self::login).
    ///
    /// # Errors
    ///
    /// Returns the server's [`AuthError`]; session state is left untouched.
    pub async fn register(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let credentials = Credentials::new(username, password);
        let result = self.api.register(&credentials).await;
        self.finish_sign_in(&credentials, result, "account created")
    }

    /// Sign in; on success caches the returned user and navigates home.
    ///
    /// # Errors
    ///
    /// Returns the server's [`AuthError`]; session state is left untouched.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let credentials = Credentials::new(username, password);
        let result = self.api.login(&credentials).await;
        self.finish_sign_in(&credentials, result, "logged in")
    }

    /// Sign out; on success clears the cache and navigates to the login surface.
    ///
    /// # Errors
    ///
    /// Returns the server's [`AuthError`]; session state is left untouched.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.api.logout().await.inspect_err(|e| {
            tracing::warn!(error = %e, "logout failed");
        })?;

        tracing::info!("logged out");
        self.complete(None, Route::Auth);
        Ok(())
    }

    fn finish_sign_in(
        &self,
        credentials: &Credentials,
        result: Result<User, AuthError>,
        notice: &'static str,
    ) -> Result<User, AuthError> {
        let user = result.inspect_err(|e| {
            tracing::warn!(username = %credentials.username, error = %e, "sign-in failed");
        })?;

        tracing::info!(user = %user.username, "{notice}");
        self.complete(Some(user.clone()), Route::Home);
        Ok(user)
    }

    /// Cache write, navigation and send all happen under the machine lock.
    fn complete(&self, user: Option<User>, to: Route) {
        let mut machine = self.lock_machine();
        self.cache.set(user);
        let navigation = machine.navigate(to);
        self.emit(navigation);
    }

    fn emit(&self, navigation: Navigation) {
        tracing::info!(to = %navigation.to, "navigate");
        if self.nav_tx.send(navigation).is_err() {
            tracing::debug!(to = %navigation.to, "navigation receiver dropped");
        }
    }

    fn lock_machine(&self) -> MutexGuard<'_, SessionStateMachine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
