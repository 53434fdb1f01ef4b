//! Client configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Errors produced while building a [`ClientConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("invalid session cookie {0:?}: expected name=value")]
    InvalidCookie(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Timeouts {
    #[must_use]
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    #[must_use]
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server origin, without a trailing slash.
    pub base_url: String,
    pub timeouts: Timeouts,
    /// Optional `name=value` cookie used to resume an existing session.
    pub session_cookie: Option<String>,
}

impl ClientConfig {
    /// Build a config for `base_url` with default timeouts and no cookie.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] if `base_url` is not an
    /// absolute `http`/`https` URL.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self { base_url: normalize_base_url(base_url)?, timeouts: Timeouts::default(), session_cookie: None })
    }

    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `AUTHSYNC_BASE_URL`: default `http://127.0.0.1:5000`
    /// - `AUTHSYNC_REQUEST_TIMEOUT_SECS`: default 30
    /// - `AUTHSYNC_CONNECT_TIMEOUT_SECS`: default 10
    /// - `AUTHSYNC_COOKIE`: `name=value` session cookie to seed
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL or the cookie is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("AUTHSYNC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let timeouts = Timeouts {
            request_secs: env_parse_u64("AUTHSYNC_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("AUTHSYNC_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        let session_cookie = std::env::var("AUTHSYNC_COOKIE")
            .ok()
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| parse_cookie(&raw))
            .transpose()?;

        Ok(Self { base_url: normalize_base_url(&base_url)?, timeouts, session_cookie })
    }

    /// Replace the base URL, keeping the other settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] on a malformed URL.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ConfigError> {
        self.base_url = normalize_base_url(base_url)?;
        Ok(self)
    }

    /// Replace the seeded session cookie.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidCookie`] if `cookie` is not `name=value`.
    pub fn with_session_cookie(mut self, cookie: &str) -> Result<Self, ConfigError> {
        self.session_cookie = Some(parse_cookie(cookie)?);
        Ok(self)
    }

    /// Absolute URL for an API path such as `/api/user`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let invalid = |reason: String| ConfigError::InvalidBaseUrl { url: raw.to_string(), reason };

    let url = reqwest::Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

fn parse_cookie(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    match trimmed.split_once('=') {
        Some((name, _)) if !name.trim().is_empty() => Ok(trimmed.to_string()),
        _ => Err(ConfigError::InvalidCookie(raw.to_string())),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
