//! Reconciliation between the source and target stores.
//!
//! # Responsibility
//! - Run passes over two independently mutable task lists with no shared key.
//! - Report every create, skip, repair, reset and completion for audit.
//!
//! # Invariants
//! - One pass runs single-threaded, phase by phase.
//! - Per-record write failures never escalate to pass failures.

pub mod engine;
pub mod error;
pub mod report;
pub mod runner;
