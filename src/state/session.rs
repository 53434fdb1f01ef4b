//! Session status derivation and the unauthenticated-redirect rule.
//!
//! SYSTEM CONTEXT
//! ==============
//! `AuthSession` feeds this module the current cache entry and location; the
//! module answers with the derived status and, when needed, a [`Navigation`]
//! command. Nothing here performs I/O, so every rule can be tested without a
//! router or a server.
//!
//! STATES
//! ======
//! `Initializing` -> `Authenticated(user)` | `Anonymous`. `Initializing` is only
//! ever the starting state. The redirect rule never fires while initializing,
//! so an anonymous flash is impossible before the first fetch settles.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::fmt;

use serde::Serialize;

use super::cache::CacheEntry;
use crate::net::types::{FetchOutcome, User};

// =============================================================================
// STATUS
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Initializing,
    Authenticated(User),
    Anonymous,
}

impl SessionStatus {
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(user) => Some(user),
            Self::Initializing | Self::Anonymous => None,
        }
    }

    /// Value to store in the cache for this status. `Initializing` has none.
    #[must_use]
    pub fn into_user(self) -> Option<User> {
        match self {
            Self::Authenticated(user) => Some(user),
            Self::Initializing | Self::Anonymous => None,
        }
    }

    /// Consumer-facing `{ user, loading }` view.
    #[must_use]
    pub fn state(&self) -> SessionState {
        SessionState { user: self.user().cloned(), loading: matches!(self, Self::Initializing) }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Authenticated(_) => "authenticated",
            Self::Anonymous => "anonymous",
        }
    }
}

impl From<&CacheEntry> for SessionStatus {
    fn from(entry: &CacheEntry) -> Self {
        match entry {
            CacheEntry::Unknown => Self::Initializing,
            CacheEntry::Anonymous => Self::Anonymous,
            CacheEntry::User(user) => Self::Authenticated(user.clone()),
        }
    }
}

/// Status a settled fetch moves the session to. Only `Success` authenticates;
/// a transient failure is treated exactly like a 401.
#[must_use]
pub fn status_for_outcome(outcome: &FetchOutcome) -> SessionStatus {
    match outcome {
        FetchOutcome::Success(user) => SessionStatus::Authenticated(user.clone()),
        FetchOutcome::Unauthenticated | FetchOutcome::TransientError(_) => SessionStatus::Anonymous,
    }
}

/// Derived view handed to consumers. Exactly one of `loading`, `user == None`
/// or `user == Some(_)` describes the session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub user: Option<User>,
    pub loading: bool,
}

// =============================================================================
// ROUTES AND NAVIGATION
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    /// Login surface.
    Auth,
    /// Authenticated home surface.
    Home,
}

impl Route {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Auth => "/auth",
            Self::Home => "/",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Command to move the user to `to`. Emitted, never performed, by this module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Navigation {
    pub to: Route,
}

/// True when `location` is the login surface, ignoring query string,
/// fragment and a trailing slash.
#[must_use]
pub fn is_login_surface(location: &str) -> bool {
    let path = location.split(['?', '#']).next().unwrap_or_default();
    let path = path.trim_end_matches('/');
    path == Route::Auth.path()
}

/// Redirect when the session is known anonymous and the user is elsewhere.
#[must_use]
pub fn should_redirect_unauth(status: &SessionStatus, location: &str) -> bool {
    matches!(status, SessionStatus::Anonymous) && !is_login_surface(location)
}

// =============================================================================
// MACHINE
// =============================================================================

/// Tracks the current location and turns status changes into navigation.
///
/// An emitted navigation is taken as the new location, so evaluating the same
/// status again is a no-op until the location changes.
#[derive(Clone, Debug)]
pub struct SessionStateMachine {
    location: String,
}

impl SessionStateMachine {
    #[must_use]
    pub fn new(location: impl Into<String>) -> Self {
        Self { location: location.into() }
    }

    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Re-evaluate the redirect rule against `status`.
    pub fn observe(&mut self, status: &SessionStatus) -> Option<Navigation> {
        if should_redirect_unauth(status, &self.location) {
            Some(self.navigate(Route::Auth))
        } else {
            None
        }
    }

    /// Record a location change reported by the router, then re-evaluate.
    pub fn set_location(&mut self, location: impl Into<String>, status: &SessionStatus) -> Option<Navigation> {
        self.location = location.into();
        self.observe(status)
    }

    /// Unconditional navigation, used after successful operations.
    pub fn navigate(&mut self, to: Route) -> Navigation {
        to.path().clone_into(&mut self.location);
        Navigation { to }
    }
}
