//! # Agenteur Shared Library
//!
//! Credential, authorization and invitation core used by the Agenteur API
//! server.
//!
//! ## Module Organization
//!
//! - `auth`: password hashing, access tokens, opaque tokens, authorization gates
//! - `context`: per-request context (request id, cancellation, deadline)
//! - `db`: PostgreSQL pool and migrations
//! - `error`: core error taxonomy
//! - `models`: persisted entities and their SQL
//! - `notifier`: outbound invitation delivery
//! - `services`: session, organization, invitation and user operations
//! - `store`: repository capability with PostgreSQL and in-memory backends

pub mod auth;
pub mod context;
pub mod db;
pub mod error;
pub mod models;
pub mod notifier;
pub mod services;
pub mod store;

/// Current version of the Agenteur shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
