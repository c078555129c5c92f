//! Store adapter contracts and implementations.
//!
//! # Responsibility
//! - Define the source (record-keeping) and target (remote to-do) contracts
//!   the reconciliation engine depends on.
//! - Classify adapter failures into read errors (fatal to a pass) and write
//!   errors (recorded per record).
//!
//! # Invariants
//! - Adapters translate their native shapes into `TaskRecord` and never parse
//!   link markers themselves.
//! - Rate-limit, auth, transport and not-found failures stay distinguishable.

use crate::link::marker::rewrite_source_marker;
use crate::model::task::{NewTargetTask, SourceId, TargetId, TaskRecord};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory_target;
pub mod sqlite_source;

pub type ReadResult<T> = Result<T, StoreReadError>;
pub type WriteResult<T> = Result<T, StoreWriteError>;

/// Which store an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreSide {
    Source,
    Target,
}

impl Display for StoreSide {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Target => f.write_str("target"),
        }
    }
}

/// Failure classification shared by both adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The addressed record does not exist.
    NotFound,
    /// Rate limited or busy; may succeed on a later pass.
    Throttled,
    /// Credentials rejected or write not permitted.
    Unauthorized,
    /// Network/storage transport failure.
    Transport,
    /// Remote quota exhausted.
    Quota,
    /// The store returned data that cannot be mapped.
    InvalidData,
}

impl StoreErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Throttled => "throttled",
            Self::Unauthorized => "unauthorized",
            Self::Transport => "transport",
            Self::Quota => "quota",
            Self::InvalidData => "invalid_data",
        }
    }
}

/// Snapshot read failure. Fatal to the current pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreReadError {
    pub side: StoreSide,
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreReadError {
    pub fn new(side: StoreSide, kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            side,
            kind,
            message: message.into(),
        }
    }
}

impl Display for StoreReadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} store read failed ({}): {}",
            self.side,
            self.kind.as_str(),
            self.message
        )
    }
}

impl Error for StoreReadError {}

/// Single-record write failure. Recorded; the pass continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreWriteError {
    pub side: StoreSide,
    pub kind: StoreErrorKind,
    /// Identifier of the record the write addressed.
    pub record: String,
    pub message: String,
}

impl StoreWriteError {
    pub fn new(
        side: StoreSide,
        kind: StoreErrorKind,
        record: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            side,
            kind,
            record: record.into(),
            message: message.into(),
        }
    }

    pub fn not_found(side: StoreSide, record: impl Into<String>) -> Self {
        let record = record.into();
        let message = format!("record `{record}` does not exist");
        Self::new(side, StoreErrorKind::NotFound, record, message)
    }
}

impl Display for StoreWriteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} store write failed for `{}` ({}): {}",
            self.side,
            self.record,
            self.kind.as_str(),
            self.message
        )
    }
}

impl Error for StoreWriteError {}

/// Record-keeping side of the sync.
pub trait SourceStore {
    /// All records not yet `Synced`, in stable creation order.
    fn list_unsynced(&self) -> ReadResult<Vec<TaskRecord>>;
    /// Full snapshot including synced and completed records.
    fn list_all(&self) -> ReadResult<Vec<TaskRecord>>;
    /// Sets `Synced` and writes the target marker into the remark field.
    fn mark_synced(&mut self, source_id: &SourceId, target_id: &TargetId) -> WriteResult<()>;
    /// Sets the mirrored completed flag. Idempotent.
    fn mark_completed(&mut self, source_id: &SourceId) -> WriteResult<()>;
    /// Clears `sync_state` back to `Unsynced`.
    fn reset_sync_state(&mut self, source_id: &SourceId) -> WriteResult<()>;
}

/// Remote to-do side of the sync.
pub trait TargetStore {
    /// Snapshot of the remote list. May be capped by the adapter.
    fn list_all(&self, include_completed: bool) -> ReadResult<Vec<TaskRecord>>;
    /// Creates one task and returns its assigned identifier.
    fn create(&mut self, task: &NewTargetTask) -> WriteResult<TargetId>;
    /// Overwrites the notes field of one task.
    fn update_notes(&mut self, target_id: &TargetId, notes: &str) -> WriteResult<()>;

    /// Titles of every task currently present, in any state.
    fn existing_titles(&self) -> ReadResult<BTreeSet<String>> {
        Ok(self
            .list_all(true)?
            .into_iter()
            .map(|task| task.title)
            .collect())
    }

    /// Restores the source marker inside a surviving task's notes without
    /// re-creating the task. Other note text is preserved.
    fn repair_link(&mut self, target_id: &TargetId, source_id: &SourceId) -> WriteResult<()> {
        let current = self
            .list_all(true)
            .map_err(|err| {
                StoreWriteError::new(StoreSide::Target, err.kind, target_id.as_str(), err.message)
            })?
            .into_iter()
            .find(|task| task.target_id.as_ref() == Some(target_id))
            .ok_or_else(|| StoreWriteError::not_found(StoreSide::Target, target_id.as_str()))?;

        let notes = rewrite_source_marker(&current.link_text, source_id);
        self.update_notes(target_id, &notes)
    }
}
