//! Task record domain model.
//!
//! # Responsibility
//! - Define the record shape both the source and the target store map into.
//! - Own title normalization and due-date rendering rules.
//!
//! # Invariants
//! - `source_id` is stable and never reused for another source record.
//! - `sync_state` is owned by the source store, `completed` by the target.
//! - A blank source title is replaced by [`UNTITLED_PLACEHOLDER`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Title substituted when the source store provides none.
pub const UNTITLED_PLACEHOLDER: &str = "Untitled";

/// Opaque identifier assigned by the source store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

/// Opaque identifier assigned by the target store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

macro_rules! opaque_id {
    ($name:ident) => {
        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

opaque_id!(SourceId);
opaque_id!(TargetId);

/// Upload state of a source record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Not yet mirrored, or reset after a broken link.
    #[default]
    Unsynced,
    /// Mirrored; a live target task should link back to it.
    Synced,
}

impl SyncState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unsynced => "unsynced",
            Self::Synced => "synced",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unsynced" => Some(Self::Unsynced),
            "synced" => Some(Self::Synced),
            _ => None,
        }
    }
}

/// Canonical record both stores are translated into.
///
/// Source reads fill `source_id` and put the remark text into `link_text`;
/// target reads fill `target_id` and put the notes text into `link_text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub source_id: Option<SourceId>,
    pub target_id: Option<TargetId>,
    /// Display string and deduplication key.
    pub title: String,
    pub due_date: Option<NaiveDate>,
    pub sync_state: SyncState,
    pub completed: bool,
    /// Raw free-text field carrying the link marker (remark or notes).
    pub link_text: String,
}

impl TaskRecord {
    /// Builds a record read from the source store.
    pub fn from_source(source_id: SourceId, title: &str) -> Self {
        Self {
            source_id: Some(source_id),
            target_id: None,
            title: normalize_title(title),
            due_date: None,
            sync_state: SyncState::Unsynced,
            completed: false,
            link_text: String::new(),
        }
    }

    /// Builds a record read from the target store.
    pub fn from_target(target_id: TargetId, title: impl Into<String>) -> Self {
        Self {
            source_id: None,
            target_id: Some(target_id),
            title: title.into(),
            due_date: None,
            sync_state: SyncState::Unsynced,
            completed: false,
            link_text: String::new(),
        }
    }

    pub fn is_synced(&self) -> bool {
        self.sync_state == SyncState::Synced
    }

    /// Human-readable label for logs and audit lines.
    pub fn display_name(&self) -> String {
        match (&self.source_id, &self.target_id) {
            (Some(id), _) => format!("'{}' (source {id})", self.title),
            (None, Some(id)) => format!("'{}' (target {id})", self.title),
            (None, None) => format!("'{}'", self.title),
        }
    }
}

/// Payload for creating one target task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTargetTask {
    pub title: String,
    pub due_date: Option<NaiveDate>,
    /// Initial notes; always carries the source marker.
    pub notes: String,
}

/// Trims a title and substitutes the placeholder when nothing remains.
pub fn normalize_title(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        UNTITLED_PLACEHOLDER.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Renders a due date as a midnight-UTC timestamp for remote to-do APIs.
pub fn due_timestamp(date: NaiveDate) -> String {
    format!("{}T00:00:00.000Z", date.format("%Y-%m-%d"))
}

/// Reads the calendar date back out of a remote due timestamp.
///
/// Remote APIs keep only the date part of a due time; anything after it is
/// ignored.
pub fn parse_due_timestamp(value: &str) -> Option<NaiveDate> {
    let date = value.get(..10)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}
