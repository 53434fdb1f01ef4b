//! # authsync
//!
//! Client-side session synchronization for a cookie-session HTTP server.
//!
//! The crate keeps one answer to "who is signed in" consistent across the
//! initial `GET /api/user` fetch, a single-slot cache, and the navigation
//! commands that steer anonymous users to the login surface. Register, login
//! and logout update the cache before any navigation is emitted.

pub mod config;
pub mod net;
pub mod state;
