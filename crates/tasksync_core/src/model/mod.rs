//! Canonical in-memory shapes shared by both stores.
//!
//! # Responsibility
//! - Define the task record every store adapter translates into.
//! - Keep source/target identities as distinct types so they cannot be mixed.
//!
//! # Invariants
//! - Records are materialized per pass from live reads and never cached.
//! - The marker text fields are the only persisted cross-store relation.

pub mod task;
