//! Networking modules for the session HTTP contract.
//!
//! SYSTEM CONTEXT
//! ==============
//! `api` owns the REST calls and their outcome classification, `types`
//! defines the wire schema shared with the server.

pub mod api;
pub mod types;
