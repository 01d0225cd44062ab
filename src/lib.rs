//! TokenGate — API token authentication & authorization service.
//!
//! Issues bearer-style API tokens for the CMS backend, verifies them on
//! inbound requests, and exposes the management API for the token lifecycle
//! (revoke, regenerate, delete). Secrets are stored only as SHA-256 digests.

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod store;

use store::postgres::PgStore;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub db: PgStore,
    pub config: config::Config,
}
