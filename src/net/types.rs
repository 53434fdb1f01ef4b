//! Wire DTOs and error types for the session endpoints.
//!
//! DESIGN
//! ======
//! Response bodies are decoded into fixed shapes. A body that does not match
//! its shape is never guessed at: the fetch path treats it as a transient
//! failure and the mutating paths fall back to a default message.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// USER
// =============================================================================

/// Authenticated identity as returned by the server.
///
/// The client only ever holds a read-only copy. Extra fields the server may
/// attach are ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable server-assigned identifier.
    pub id: i64,
    /// Display name chosen at registration.
    pub username: String,
}

// =============================================================================
// REQUEST BODIES
// =============================================================================

/// Body of `POST /api/register` and `POST /api/login`.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// RESPONSE SHAPES
// =============================================================================

/// Fixed error schema for non-2xx responses: `{ "error": "..." }`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Classified result of the "who am I" query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Server reported no active session (HTTP 401). Expected, not an error.
    Unauthenticated,
    /// Server returned a valid user record.
    Success(User),
    /// Any other status, a malformed body, or a network failure.
    TransientError(String),
}

// =============================================================================
// ERRORS
// =============================================================================

/// Failure of a register, login or logout call.
///
/// Session state is never modified when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The server answered with a non-2xx status.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The request could not be sent or the response could not be read.
    #[error("request failed: {0}")]
    Transport(String),

    /// The server answered 2xx but the user body did not parse.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl AuthError {
    /// Human-readable message suitable for display next to a form.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Rejected { message, .. } => message,
            Self::Transport(detail) | Self::Decode(detail) => detail,
        }
    }
}
