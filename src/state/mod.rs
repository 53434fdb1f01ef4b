//! Client session state.
//!
//! SYSTEM CONTEXT
//! ==============
//! `cache` stores the last known user, `session` derives status and redirect
//! decisions from it, and `auth` ties both to the network operations behind a
//! single consumer-facing handle.

pub mod auth;
pub mod cache;
pub mod session;
