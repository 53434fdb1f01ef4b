//! REST client for the session endpoints.
//!
//! The [`SessionApi`] trait is the seam between session state and the network;
//! [`HttpSessionApi`] is the `reqwest` implementation. The session cookie
//! lives in a cookie jar shared by every request, so no credential is ever
//! passed explicitly.
//!
//! ERROR HANDLING
//! ==============
//! `fetch_current_user` never fails: every problem is folded into
//! [`FetchOutcome::TransientError`]. The mutating calls return [`AuthError`]
//! with the server's `error` string, or a fixed default when the body does not
//! match the error schema.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};

use super::types::{AuthError, Credentials, ErrorBody, FetchOutcome, User};
use crate::config::ClientConfig;

pub const USER_PATH: &str = "/api/user";
pub const REGISTER_PATH: &str = "/api/register";
pub const LOGIN_PATH: &str = "/api/login";
pub const LOGOUT_PATH: &str = "/api/logout";

pub const REGISTER_FAILED_MESSAGE: &str = "Failed to sign up";
pub const LOGIN_FAILED_MESSAGE: &str = "Invalid credentials";
pub const LOGOUT_FAILED_MESSAGE: &str = "Failed to log out";

// =============================================================================
// SESSION API TRAIT
// =============================================================================

/// The four calls session state needs from the server. Enables mocking in tests.
#[async_trait::async_trait]
pub trait SessionApi: Send + Sync {
    /// `GET /api/user`, classified. Never fails.
    async fn fetch_current_user(&self) -> FetchOutcome;

    /// `POST /api/register`.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the server rejects the account or is unreachable.
    async fn register(&self, credentials: &Credentials) -> Result<User, AuthError>;

    /// `POST /api/login`.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the credentials are rejected or the server is unreachable.
    async fn login(&self, credentials: &Credentials) -> Result<User, AuthError>;

    /// `POST /api/logout`. The response body is ignored on success.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the server does not confirm the logout.
    async fn logout(&self) -> Result<(), AuthError>;
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

/// Errors building an [`HttpSessionApi`].
#[derive(Debug, thiserror::Error)]
pub enum ApiBuildError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

pub struct HttpSessionApi {
    http: reqwest::Client,
    jar: Arc<Jar>,
    origin: reqwest::Url,
    config: ClientConfig,
}

impl HttpSessionApi {
    /// Build a client with its own cookie jar, seeded from
    /// `config.session_cookie` when present.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL does not parse or the HTTP client fails to build.
    pub fn new(config: ClientConfig) -> Result<Self, ApiBuildError> {
        let origin = reqwest::Url::parse(&config.base_url).map_err(|e| ApiBuildError::InvalidBaseUrl(e.to_string()))?;

        let jar = Arc::new(Jar::default());
        if let Some(cookie) = &config.session_cookie {
            jar.add_cookie_str(cookie, &origin);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeouts.request())
            .connect_timeout(config.timeouts.connect())
            .cookie_provider(Arc::clone(&jar))
            .build()
            .map_err(|e| ApiBuildError::HttpClientBuild(e.to_string()))?;

        Ok(Self { http, jar, origin, config })
    }

    /// The `Cookie` header value currently held for the server, if any.
    #[must_use]
    pub fn session_cookie(&self) -> Option<String> {
        self.jar
            .cookies(&self.origin)
            .and_then(|value| value.to_str().ok().map(str::to_owned))
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn submit_credentials(
        &self,
        path: &str,
        credentials: &Credentials,
        default_message: &str,
    ) -> Result<User, AuthError> {
        let response = self
            .http
            .post(self.config.endpoint(path))
            .json(credentials)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message: rejection_message(&body, default_message),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        serde_json::from_str::<User>(&body).map_err(|e| AuthError::Decode(e.to_string()))
    }
}

#[async_trait::async_trait]
impl SessionApi for HttpSessionApi {
    async fn fetch_current_user(&self) -> FetchOutcome {
        let response = match self.http.get(self.config.endpoint(USER_PATH)).send().await {
            Ok(response) => response,
            Err(e) => return FetchOutcome::TransientError(e.to_string()),
        };

        let status = response.status().as_u16();
        if status == 401 {
            return FetchOutcome::Unauthenticated;
        }
        match response.text().await {
            Ok(body) => classify_fetch(status, &body),
            Err(e) => FetchOutcome::TransientError(e.to_string()),
        }
    }

    async fn register(&self, credentials: &Credentials) -> Result<User, AuthError> {
        self.submit_credentials(REGISTER_PATH, credentials, REGISTER_FAILED_MESSAGE)
            .await
    }

    async fn login(&self, credentials: &Credentials) -> Result<User, AuthError> {
        self.submit_credentials(LOGIN_PATH, credentials, LOGIN_FAILED_MESSAGE)
            .await
    }

    async fn logout(&self) -> Result<(), AuthError> {
        let response = self
            .http
            .post(self.config.endpoint(LOGOUT_PATH))
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(AuthError::Rejected { status: status.as_u16(), message: rejection_message(&body, LOGOUT_FAILED_MESSAGE) })
    }
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// Classify a `GET /api/user` response by status and raw body.
#[must_use]
pub fn classify_fetch(status: u16, body: &str) -> FetchOutcome {
    match status {
        401 => FetchOutcome::Unauthenticated,
        200..=299 => match serde_json::from_str::<User>(body) {
            Ok(user) => FetchOutcome::Success(user),
            Err(e) => FetchOutcome::TransientError(format!("malformed user body: {e}")),
        },
        other => FetchOutcome::TransientError(format!("unexpected status {other}")),
    }
}

/// Message to surface for a non-2xx response: the body's `error` string when
/// it matches [`ErrorBody`] and is non-empty, otherwise `default_message`.
#[must_use]
pub fn rejection_message(body: &str, default_message: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|parsed| parsed.error)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| default_message.to_owned())
}
