//! Cross-store identity index built from target notes markers.
//!
//! # Invariants
//! - Built fresh from one target snapshot; never cached across passes.
//! - Tasks with a missing or malformed marker get no entry.
//! - When two tasks claim one source id, the first in snapshot order wins.

use crate::link::marker::{parse_source_id, LinkParseError};
use crate::model::task::{SourceId, TargetId, TaskRecord};
use log::{debug, warn};
use std::collections::HashMap;

/// Mapping `source_id -> target task` for one target snapshot.
#[derive(Debug, Default)]
pub struct LinkIndex {
    by_source: HashMap<SourceId, TaskRecord>,
    source_by_target: HashMap<TargetId, SourceId>,
    unlinked: usize,
}

impl LinkIndex {
    /// Scans every task's notes for a source marker.
    pub fn build(targets: &[TaskRecord]) -> Self {
        let mut index = Self::default();

        for task in targets {
            let source_id = match parse_source_id(&task.link_text) {
                Ok(source_id) => source_id,
                Err(err @ LinkParseError::EmptyValue(_)) => {
                    warn!(
                        "event=link_parse module=link status=malformed task={} error={}",
                        task.display_name(),
                        err
                    );
                    index.unlinked += 1;
                    continue;
                }
                Err(err) => {
                    debug!(
                        "event=link_parse module=link status=missing task={} error={}",
                        task.display_name(),
                        err
                    );
                    index.unlinked += 1;
                    continue;
                }
            };

            if let Some(existing) = index.by_source.get(&source_id) {
                warn!(
                    "event=link_parse module=link status=duplicate source_id={} kept={} ignored={}",
                    source_id,
                    existing.display_name(),
                    task.display_name()
                );
                continue;
            }

            if let Some(target_id) = task.target_id.clone() {
                index.source_by_target.insert(target_id, source_id.clone());
            }
            index.by_source.insert(source_id, task.clone());
        }

        debug!(
            "event=link_index module=link status=ok linked={} unlinked={}",
            index.by_source.len(),
            index.unlinked
        );
        index
    }

    /// Target task linked to `source_id`, if any.
    pub fn get(&self, source_id: &SourceId) -> Option<&TaskRecord> {
        self.by_source.get(source_id)
    }

    pub fn contains(&self, source_id: &SourceId) -> bool {
        self.by_source.contains_key(source_id)
    }

    /// Source id recorded in the notes of the given target task.
    pub fn source_for(&self, target_id: &TargetId) -> Option<&SourceId> {
        self.source_by_target.get(target_id)
    }

    pub fn len(&self) -> usize {
        self.by_source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty()
    }

    /// Number of tasks whose notes carried no usable marker.
    pub fn unlinked_count(&self) -> usize {
        self.unlinked
    }
}

#[cfg(test)]
mod tests {
    use super::LinkIndex;
    use crate::model::task::{SourceId, TargetId, TaskRecord};

    fn target(id: &str, notes: &str) -> TaskRecord {
        let mut task = TaskRecord::from_target(TargetId::new(id), format!("task {id}"));
        task.link_text = notes.to_string();
        task
    }

    #[test]
    fn maps_source_ids_both_ways() {
        let index = LinkIndex::build(&[
            target("t-1", "Source Task ID: s-1"),
            target("t-2", "notes first\nSource Task ID: s-2"),
        ]);

        assert_eq!(index.len(), 2);
        let linked = index.get(&SourceId::new("s-2")).expect("s-2 should be linked");
        assert_eq!(linked.target_id, Some(TargetId::new("t-2")));
        assert_eq!(
            index.source_for(&TargetId::new("t-1")),
            Some(&SourceId::new("s-1"))
        );
    }

    #[test]
    fn missing_or_malformed_markers_yield_no_entry() {
        let index = LinkIndex::build(&[
            target("t-1", ""),
            target("t-2", "Source Task ID:"),
            target("t-3", "Source Task ID: s-3"),
        ]);

        assert_eq!(index.len(), 1);
        assert_eq!(index.unlinked_count(), 2);
        assert!(index.source_for(&TargetId::new("t-2")).is_none());
    }

    #[test]
    fn first_claim_on_a_source_id_wins() {
        let index = LinkIndex::build(&[
            target("t-1", "Source Task ID: s-1"),
            target("t-2", "Source Task ID: s-1"),
        ]);

        assert_eq!(index.len(), 1);
        let linked = index.get(&SourceId::new("s-1")).unwrap();
        assert_eq!(linked.target_id, Some(TargetId::new("t-1")));
        assert!(index.source_for(&TargetId::new("t-2")).is_none());
    }

    #[test]
    fn empty_snapshot_builds_empty_index() {
        let index = LinkIndex::build(&[]);
        assert!(index.is_empty());
        assert_eq!(index.unlinked_count(), 0);
    }
}
