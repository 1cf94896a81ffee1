// crates/flowctl-store-sqlite/src/lib.rs
// ============================================================================
// Crate: flowctl-store-sqlite
// Description: SQLite-backed `RuleStore` implementation.
// ============================================================================

//! # flowctl-store-sqlite
//!
//! Implements [`flowctl_core::RuleStore`] against a SQLite database using
//! the legacy `reglas`/`logs` schema, with one short-lived connection per
//! operation rather than a persistent writer thread.

#![forbid(unsafe_code)]

pub mod store;

pub use store::bootstrap_schema;
pub use store::SqliteRuleStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
