//! Pass report and audit trail.
//!
//! # Invariants
//! - Every skip, repair, reset, unresolved completion and failed write adds
//!   exactly one audit entry, in the order it happened.
//! - Counters always agree with the audit entries.

use crate::link::marker::LinkParseError;
use crate::model::task::{SourceId, TargetId, TaskRecord};
use crate::store::StoreWriteError;
use crate::sync::error::{PassAbortError, SyncPhase};
use std::fmt::{Display, Formatter};

/// Why a synced record's link could not be repaired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetReason {
    /// The remark field carries no target marker.
    NoMarker,
    /// The remark field carries a marker label without a value.
    MalformedMarker,
    /// The remark names a target task that no longer exists.
    TargetMissing(TargetId),
}

impl From<LinkParseError> for ResetReason {
    fn from(value: LinkParseError) -> Self {
        match value {
            LinkParseError::MissingLabel(_) => Self::NoMarker,
            LinkParseError::EmptyValue(_) => Self::MalformedMarker,
        }
    }
}

impl Display for ResetReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoMarker => f.write_str("no target marker in remark"),
            Self::MalformedMarker => f.write_str("target marker in remark is empty"),
            Self::TargetMissing(id) => write!(f, "target task {id} no longer exists"),
        }
    }
}

/// One human-readable line of the pass audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEntry {
    Created {
        title: String,
        source_id: SourceId,
        target_id: TargetId,
    },
    SkippedDuplicate {
        title: String,
        source_id: SourceId,
    },
    Repaired {
        title: String,
        source_id: SourceId,
        target_id: TargetId,
    },
    Reset {
        title: String,
        source_id: SourceId,
        reason: ResetReason,
    },
    Completed {
        title: String,
        source_id: SourceId,
        target_id: TargetId,
    },
    Unresolved {
        title: String,
        target_id: TargetId,
    },
    WriteFailed {
        phase: SyncPhase,
        operation: &'static str,
        subject: String,
        error: StoreWriteError,
    },
}

impl AuditEntry {
    /// Whether an operator should look at this entry.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::Reset { .. } | Self::Unresolved { .. } | Self::WriteFailed { .. }
        )
    }
}

impl Display for AuditEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created {
                title, target_id, ..
            } => write!(f, "created '{title}' as target task {target_id}"),
            Self::SkippedDuplicate { title, .. } => write!(
                f,
                "skipped '{title}': a target task with the same title already exists"
            ),
            Self::Repaired {
                title, target_id, ..
            } => write!(f, "repaired link of '{title}' to target task {target_id}"),
            Self::Reset { title, reason, .. } => write!(
                f,
                "warning: '{title}' has no target task ({reason}); upload state was reset"
            ),
            Self::Completed { title, .. } => {
                write!(f, "marked '{title}' completed from the target store")
            }
            Self::Unresolved { title, target_id } => write!(
                f,
                "warning: completed target task '{title}' ({target_id}) has no matching source record"
            ),
            Self::WriteFailed {
                phase,
                operation,
                subject,
                error,
            } => write!(f, "error: {operation} failed for {subject} during {phase}: {error}"),
        }
    }
}

/// Aggregated outcome of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    pub skipped_duplicates: usize,
    pub healthy_links: usize,
    pub repaired_links: usize,
    pub reset_links: usize,
    pub completions_propagated: usize,
    /// Completed target tasks whose source record was already mirrored.
    pub already_completed: usize,
    pub unresolved_completions: usize,
    pub write_failures: usize,
    pub duration_ms: u64,
    pub entries: Vec<AuditEntry>,
}

impl SyncReport {
    pub(crate) fn record_created(
        &mut self,
        record: &TaskRecord,
        source_id: &SourceId,
        target_id: &TargetId,
    ) {
        self.created += 1;
        self.entries.push(AuditEntry::Created {
            title: record.title.clone(),
            source_id: source_id.clone(),
            target_id: target_id.clone(),
        });
    }

    pub(crate) fn record_skipped(&mut self, record: &TaskRecord, source_id: &SourceId) {
        self.skipped_duplicates += 1;
        self.entries.push(AuditEntry::SkippedDuplicate {
            title: record.title.clone(),
            source_id: source_id.clone(),
        });
    }

    pub(crate) fn record_repaired(
        &mut self,
        record: &TaskRecord,
        source_id: &SourceId,
        target_id: TargetId,
    ) {
        self.repaired_links += 1;
        self.entries.push(AuditEntry::Repaired {
            title: record.title.clone(),
            source_id: source_id.clone(),
            target_id,
        });
    }

    pub(crate) fn record_reset(
        &mut self,
        record: &TaskRecord,
        source_id: &SourceId,
        reason: ResetReason,
    ) {
        self.reset_links += 1;
        self.entries.push(AuditEntry::Reset {
            title: record.title.clone(),
            source_id: source_id.clone(),
            reason,
        });
    }

    pub(crate) fn record_completed(
        &mut self,
        record: &TaskRecord,
        source_id: &SourceId,
        target_id: &TargetId,
    ) {
        self.completions_propagated += 1;
        self.entries.push(AuditEntry::Completed {
            title: record.title.clone(),
            source_id: source_id.clone(),
            target_id: target_id.clone(),
        });
    }

    pub(crate) fn record_unresolved(&mut self, task: &TaskRecord, target_id: &TargetId) {
        self.unresolved_completions += 1;
        self.entries.push(AuditEntry::Unresolved {
            title: task.title.clone(),
            target_id: target_id.clone(),
        });
    }

    pub(crate) fn record_failure(
        &mut self,
        phase: SyncPhase,
        operation: &'static str,
        record: &TaskRecord,
        error: StoreWriteError,
    ) {
        self.write_failures += 1;
        self.entries.push(AuditEntry::WriteFailed {
            phase,
            operation,
            subject: record.display_name(),
            error,
        });
    }

    /// Entries an operator should look at.
    pub fn warnings(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter().filter(|entry| entry.is_warning())
    }

    pub fn has_warnings(&self) -> bool {
        self.warnings().next().is_some()
    }

    /// Renders the report for the notification sink (light HTML markup).
    pub fn summary_message(&self) -> String {
        let mut message = String::from("<b>Task sync finished</b>\n\n");
        message.push_str(&format!(
            "Duration: {:.1}s\n",
            self.duration_ms as f64 / 1000.0
        ));
        message.push_str(&format!("Created: {}\n", self.created));
        message.push_str(&format!(
            "Skipped as duplicate: {}\n",
            self.skipped_duplicates
        ));
        message.push_str(&format!("Links repaired: {}\n", self.repaired_links));
        message.push_str(&format!("Links reset: {}\n", self.reset_links));
        message.push_str(&format!(
            "Completions mirrored: {}\n",
            self.completions_propagated
        ));
        message.push_str(&format!(
            "Unresolved completions: {}\n",
            self.unresolved_completions
        ));
        if self.write_failures > 0 {
            message.push_str(&format!("Failed writes: {}\n", self.write_failures));
        }

        if !self.entries.is_empty() {
            message.push_str("\n<b>Details</b>\n");
            for entry in &self.entries {
                message.push_str(&format!("- {}\n", escape_markup(&entry.to_string())));
            }
        }
        message
    }
}

/// Renders an aborted pass for the notification sink.
pub fn abort_message(err: &PassAbortError) -> String {
    format!(
        "<b>Task sync failed</b>\n\n{}",
        escape_markup(&err.to_string())
    )
}

fn escape_markup(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
