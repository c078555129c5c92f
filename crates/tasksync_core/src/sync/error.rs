//! Pass-level errors.

use crate::store::StoreReadError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// The four ordered phases of one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Phase A: repair or reset broken links of synced records.
    LinkValidation,
    /// Phase B: dedupe by title and create missing target tasks.
    Creation,
    /// Phase C: mirror target completions back to the source.
    CompletionPropagation,
    /// Phase D: aggregate the report.
    Reporting,
}

impl SyncPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LinkValidation => "link_validation",
            Self::Creation => "creation",
            Self::CompletionPropagation => "completion_propagation",
            Self::Reporting => "reporting",
        }
    }
}

impl Display for SyncPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A snapshot read failed; the pass stopped without a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassAbortError {
    pub phase: SyncPhase,
    pub source: StoreReadError,
}

impl Display for PassAbortError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "sync pass aborted during {}: {}", self.phase, self.source)
    }
}

impl Error for PassAbortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}
