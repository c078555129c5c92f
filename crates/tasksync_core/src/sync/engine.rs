//! Reconciliation engine.
//!
//! # Responsibility
//! - Run one pass as four ordered phases: link validation, deduplication and
//!   creation, completion propagation, reporting.
//! - Keep per-record write failures inside the pass and surface them.
//!
//! # Invariants
//! - Phases never interleave; each reads fresh snapshots.
//! - A snapshot read failure aborts the pass with no partial report.
//! - Two tasks with the same title are never both created in one pass.
//! - The engine never writes `completed = false` to the source store.

use crate::link::index::LinkIndex;
use crate::link::marker::{parse_target_id, source_marker};
use crate::model::task::{NewTargetTask, SourceId, TargetId, TaskRecord};
use crate::store::{ReadResult, SourceStore, TargetStore};
use crate::sync::error::{PassAbortError, SyncPhase};
use crate::sync::report::{ResetReason, SyncReport};
use log::{debug, error, info, warn};
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

/// Title-based "already represented" check.
///
/// This is a heuristic: distinct tasks sharing a title always collide. Kept
/// as the single dedup predicate so a stronger identity scheme can replace it.
pub fn is_already_represented(existing_titles: &BTreeSet<String>, title: &str) -> bool {
    existing_titles.contains(title)
}

/// Orchestrates one source store and one target store.
///
/// `run_pass` takes `&mut self`, so one engine never runs overlapping passes.
/// Serializing passes across processes is the caller's job.
pub struct Reconciler<S: SourceStore, T: TargetStore> {
    source: S,
    target: T,
}

impl<S: SourceStore, T: TargetStore> Reconciler<S, T> {
    pub fn new(source: S, target: T) -> Self {
        Self { source, target }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn into_parts(self) -> (S, T) {
        (self.source, self.target)
    }

    /// Runs phases A through D.
    pub fn run_pass(&mut self) -> Result<SyncReport, PassAbortError> {
        let started_at = Instant::now();
        info!("event=sync_pass module=sync status=start");

        let mut report = SyncReport::default();
        if let Err(err) = self.run_phases(&mut report) {
            error!(
                "event=sync_pass module=sync status=error phase={} duration_ms={} error={}",
                err.phase,
                started_at.elapsed().as_millis(),
                err.source
            );
            return Err(err);
        }

        report.duration_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            "event=sync_pass module=sync status=ok phase={} duration_ms={} created={} skipped={} repaired={} reset={} completed={} unresolved={} failures={}",
            SyncPhase::Reporting,
            report.duration_ms,
            report.created,
            report.skipped_duplicates,
            report.repaired_links,
            report.reset_links,
            report.completions_propagated,
            report.unresolved_completions,
            report.write_failures
        );
        Ok(report)
    }

    fn run_phases(&mut self, report: &mut SyncReport) -> Result<(), PassAbortError> {
        self.validate_links(report)?;
        self.create_missing(report)?;
        self.propagate_completions(report)
    }

    /// Phase A: every `Synced` record must resolve through the link index;
    /// otherwise its link is repaired from the remark marker or reset.
    pub fn validate_links(&mut self, report: &mut SyncReport) -> Result<(), PassAbortError> {
        let phase = SyncPhase::LinkValidation;
        let sources = read(phase, self.source.list_all())?;
        let targets = read(phase, self.target.list_all(true))?;
        let index = LinkIndex::build(&targets);

        for record in sources.iter().filter(|record| record.is_synced()) {
            let Some(source_id) = record.source_id.as_ref() else {
                continue;
            };
            if index.contains(source_id) {
                report.healthy_links += 1;
                continue;
            }

            // Look the remark's target id up in the raw snapshot: the task's
            // own notes marker may be the thing that is missing.
            let reason = match parse_target_id(&record.link_text) {
                Ok(target_id) if contains_target(&targets, &target_id) => {
                    self.repair(phase, record, source_id, target_id, report);
                    continue;
                }
                Ok(target_id) => ResetReason::TargetMissing(target_id),
                Err(err) => ResetReason::from(err),
            };
            self.reset(phase, record, source_id, reason, report);
        }

        info!(
            "event=sync_phase module=sync phase={} status=ok healthy={} repaired={} reset={}",
            phase, report.healthy_links, report.repaired_links, report.reset_links
        );
        Ok(())
    }

    /// Phase B: create a target task for every unsynced record whose title is
    /// not represented yet, then mark the record synced.
    pub fn create_missing(&mut self, report: &mut SyncReport) -> Result<(), PassAbortError> {
        let phase = SyncPhase::Creation;
        let mut titles = read(phase, self.target.existing_titles())?;
        let pending = read(phase, self.source.list_unsynced())?;

        for record in &pending {
            let Some(source_id) = record.source_id.as_ref() else {
                continue;
            };
            if is_already_represented(&titles, &record.title) {
                info!(
                    "event=sync_skip module=sync phase={} reason=duplicate_title task={}",
                    phase,
                    record.display_name()
                );
                report.record_skipped(record, source_id);
                continue;
            }

            let new_task = NewTargetTask {
                title: record.title.clone(),
                due_date: record.due_date,
                notes: source_marker(source_id),
            };
            let target_id = match self.target.create(&new_task) {
                Ok(target_id) => target_id,
                Err(err) => {
                    warn!(
                        "event=sync_write module=sync phase={} op=create status=error task={} error={}",
                        phase,
                        record.display_name(),
                        err
                    );
                    report.record_failure(phase, "create", record, err);
                    continue;
                }
            };
            titles.insert(record.title.clone());
            report.record_created(record, source_id, &target_id);

            if let Err(err) = self.source.mark_synced(source_id, &target_id) {
                warn!(
                    "event=sync_write module=sync phase={} op=mark_synced status=error task={} target_id={} error={}",
                    phase,
                    record.display_name(),
                    target_id,
                    err
                );
                report.record_failure(phase, "mark_synced", record, err);
            }
        }

        info!(
            "event=sync_phase module=sync phase={} status=ok pending={} created={} skipped={}",
            phase,
            pending.len(),
            report.created,
            report.skipped_duplicates
        );
        Ok(())
    }

    /// Phase C: mirror every completed target task onto its source record.
    pub fn propagate_completions(&mut self, report: &mut SyncReport) -> Result<(), PassAbortError> {
        let phase = SyncPhase::CompletionPropagation;
        let targets = read(phase, self.target.list_all(true))?;
        let sources = read(phase, self.source.list_all())?;
        let index = LinkIndex::build(&targets);
        let sources_by_id: HashMap<&SourceId, &TaskRecord> = sources
            .iter()
            .filter_map(|record| record.source_id.as_ref().map(|id| (id, record)))
            .collect();

        for task in targets.iter().filter(|task| task.completed) {
            let Some(target_id) = task.target_id.as_ref() else {
                continue;
            };

            let resolved = index
                .source_for(target_id)
                .and_then(|source_id| sources_by_id.get(source_id).copied())
                .or_else(|| find_by_remark(&sources, target_id));

            let Some(record) = resolved else {
                warn!(
                    "event=sync_unresolved module=sync phase={} task={}",
                    phase,
                    task.display_name()
                );
                report.record_unresolved(task, target_id);
                continue;
            };
            let Some(source_id) = record.source_id.as_ref() else {
                continue;
            };

            if record.completed {
                debug!(
                    "event=sync_complete module=sync phase={} status=already task={}",
                    phase,
                    record.display_name()
                );
                report.already_completed += 1;
                continue;
            }

            match self.source.mark_completed(source_id) {
                Ok(()) => report.record_completed(record, source_id, target_id),
                Err(err) => {
                    warn!(
                        "event=sync_write module=sync phase={} op=mark_completed status=error task={} error={}",
                        phase,
                        record.display_name(),
                        err
                    );
                    report.record_failure(phase, "mark_completed", record, err);
                }
            }
        }

        info!(
            "event=sync_phase module=sync phase={} status=ok completed={} unresolved={}",
            phase, report.completions_propagated, report.unresolved_completions
        );
        Ok(())
    }

    fn repair(
        &mut self,
        phase: SyncPhase,
        record: &TaskRecord,
        source_id: &SourceId,
        target_id: TargetId,
        report: &mut SyncReport,
    ) {
        match self.target.repair_link(&target_id, source_id) {
            Ok(()) => {
                info!(
                    "event=sync_repair module=sync phase={} status=ok task={} target_id={}",
                    phase,
                    record.display_name(),
                    target_id
                );
                report.record_repaired(record, source_id, target_id);
            }
            Err(err) => {
                warn!(
                    "event=sync_write module=sync phase={} op=repair_link status=error task={} error={}",
                    phase,
                    record.display_name(),
                    err
                );
                report.record_failure(phase, "repair_link", record, err);
            }
        }
    }

    fn reset(
        &mut self,
        phase: SyncPhase,
        record: &TaskRecord,
        source_id: &SourceId,
        reason: ResetReason,
        report: &mut SyncReport,
    ) {
        match self.source.reset_sync_state(source_id) {
            Ok(()) => {
                warn!(
                    "event=sync_reset module=sync phase={} task={} reason={}",
                    phase,
                    record.display_name(),
                    reason
                );
                report.record_reset(record, source_id, reason);
            }
            Err(err) => {
                warn!(
                    "event=sync_write module=sync phase={} op=reset_sync_state status=error task={} error={}",
                    phase,
                    record.display_name(),
                    err
                );
                report.record_failure(phase, "reset_sync_state", record, err);
            }
        }
    }
}

fn read<V>(phase: SyncPhase, result: ReadResult<V>) -> Result<V, PassAbortError> {
    result.map_err(|source| PassAbortError { phase, source })
}

fn contains_target(targets: &[TaskRecord], target_id: &TargetId) -> bool {
    targets
        .iter()
        .any(|task| task.target_id.as_ref() == Some(target_id))
}

/// Secondary lookup: the first source record whose remark names `target_id`.
fn find_by_remark<'a>(sources: &'a [TaskRecord], target_id: &TargetId) -> Option<&'a TaskRecord> {
    sources.iter().find(|record| {
        parse_target_id(&record.link_text)
            .map(|linked| &linked == target_id)
            .unwrap_or(false)
    })
}
