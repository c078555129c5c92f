//! Core reconciliation logic for tasksync.
//!
//! Keeps a task list in a notes database (source store) consistent with a
//! remote to-do list (target store): new source tasks are mirrored outward,
//! completions made remotely are mirrored back.

pub mod config;
pub mod db;
pub mod link;
pub mod logging;
pub mod model;
pub mod notify;
pub mod store;
pub mod sync;

pub use config::{ConfigError, SyncConfig, TelegramConfig};
pub use link::index::LinkIndex;
pub use link::marker::{parse_source_id, parse_target_id, LinkParseError, MarkerLabel};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::task::{NewTargetTask, SourceId, SyncState, TargetId, TaskRecord};
pub use notify::{LogNotifier, Notifier, NotifyError, TelegramNotifier};
pub use store::memory_target::{MemoryTargetStore, RemoteTask, TaskPage};
pub use store::sqlite_source::SqliteSourceStore;
pub use store::{
    ReadResult, SourceStore, StoreErrorKind, StoreReadError, StoreSide, StoreWriteError,
    TargetStore, WriteResult,
};
pub use sync::engine::{is_already_represented, Reconciler};
pub use sync::error::{PassAbortError, SyncPhase};
pub use sync::report::{AuditEntry, ResetReason, SyncReport};
pub use sync::runner::run_pass_and_notify;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
