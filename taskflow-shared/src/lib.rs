//! # TaskFlow Shared Library
//!
//! This crate contains the data model, domain rules, persistence adapters,
//! synchronization layer and session controller used by the TaskFlow
//! application and reminder worker.
//!
//! ## Module Organization
//!
//! - `models`: Persisted entities (users, groups, tasks, system config)
//! - `rules`: Pure domain rules (visibility, missed reports, workload)
//! - `store`: Persistence adapters (local JSON store, shared Redis store)
//! - `redis`: Redis client wrapper used by the shared store
//! - `sync`: Live read replica fed by store subscriptions
//! - `session`: Identity, deep links and view routing

pub mod models;
pub mod redis;
pub mod rules;
pub mod session;
pub mod store;
pub mod sync;

/// Current version of the TaskFlow shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
