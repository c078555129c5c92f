//! Cross-store identity.
//!
//! # Responsibility
//! - Own the marker micro-format embedded in notes/remark fields.
//! - Build the per-pass `source_id -> target task` index.
//!
//! # Invariants
//! - Marker parsing is one pure function shared by link validation and
//!   completion propagation.

pub mod index;
pub mod marker;
