//! In-memory target store standing in for a remote to-do list.
//!
//! # Responsibility
//! - Hold a remote-shaped task list served in pages, like a paginated API.
//! - Offer the edits a person makes remotely (complete, delete) so passes can
//!   be exercised end to end.
//!
//! # Invariants
//! - A page holds at most `max_results` tasks, in insertion order.
//! - `list_all` follows page tokens until the last page, so a full snapshot
//!   never silently drops tasks.
//! - Identifiers are generated once and never reused.

use crate::link::marker::rewrite_source_marker;
use crate::model::task::{
    due_timestamp, parse_due_timestamp, NewTargetTask, SourceId, TargetId, TaskRecord,
};
use crate::store::{
    ReadResult, StoreErrorKind, StoreReadError, StoreSide, StoreWriteError, TargetStore,
    WriteResult,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Page size of a single remote tasks listing.
pub const DEFAULT_MAX_RESULTS: usize = 100;

/// One remote task as the to-do service stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTask {
    pub id: TargetId,
    pub title: String,
    #[serde(default)]
    pub notes: String,
    /// Midnight-UTC timestamp, as remote to-do APIs expect.
    #[serde(default)]
    pub due: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

impl RemoteTask {
    fn to_record(&self) -> TaskRecord {
        let mut record = TaskRecord::from_target(self.id.clone(), self.title.clone());
        record.due_date = self.due.as_deref().and_then(parse_due_timestamp);
        record.completed = self.completed;
        record.link_text = self.notes.clone();
        record
    }
}

/// One listing page and the token of the page after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPage {
    pub tasks: Vec<TaskRecord>,
    pub next_page_token: Option<String>,
}

/// Target store backed by a plain task vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryTargetStore {
    #[serde(default = "default_max_results")]
    max_results: usize,
    #[serde(default)]
    tasks: Vec<RemoteTask>,
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

impl Default for MemoryTargetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTargetStore {
    pub fn new() -> Self {
        Self::with_max_results(DEFAULT_MAX_RESULTS)
    }

    pub fn with_max_results(max_results: usize) -> Self {
        Self {
            max_results,
            tasks: Vec::new(),
        }
    }

    pub fn set_max_results(&mut self, max_results: usize) {
        self.max_results = max_results;
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Every stored task, ignoring the listing cap.
    pub fn tasks(&self) -> &[RemoteTask] {
        &self.tasks
    }

    pub fn get(&self, target_id: &TargetId) -> Option<&RemoteTask> {
        self.tasks.iter().find(|task| &task.id == target_id)
    }

    /// Inserts a task created outside the sync, e.g. directly in the remote app.
    pub fn insert_external(&mut self, title: &str, notes: &str) -> TargetId {
        let id = TargetId::new(Uuid::new_v4().to_string());
        self.tasks.push(RemoteTask {
            id: id.clone(),
            title: title.to_string(),
            notes: notes.to_string(),
            due: None,
            completed: false,
        });
        id
    }

    /// Marks a task completed, as a person ticking it off remotely would.
    pub fn complete(&mut self, target_id: &TargetId) -> bool {
        match self.tasks.iter_mut().find(|task| &task.id == target_id) {
            Some(task) => {
                task.completed = true;
                true
            }
            None => false,
        }
    }

    /// Re-opens a completed task.
    pub fn reopen(&mut self, target_id: &TargetId) -> bool {
        match self.tasks.iter_mut().find(|task| &task.id == target_id) {
            Some(task) => {
                task.completed = false;
                true
            }
            None => false,
        }
    }

    /// Removes a task, as a remote deletion would.
    pub fn delete(&mut self, target_id: &TargetId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| &task.id != target_id);
        self.tasks.len() != before
    }

    fn task_mut(&mut self, target_id: &TargetId) -> WriteResult<&mut RemoteTask> {
        self.tasks
            .iter_mut()
            .find(|task| &task.id == target_id)
            .ok_or_else(|| StoreWriteError::not_found(StoreSide::Target, target_id.as_str()))
    }

    /// Lists one page of at most `max_results` tasks starting at `page_token`.
    ///
    /// # Errors
    /// - `page_token` was not issued by a previous page.
    pub fn list_page(
        &self,
        include_completed: bool,
        page_token: Option<&str>,
    ) -> ReadResult<TaskPage> {
        let offset = match page_token {
            Some(token) => token.parse::<usize>().map_err(|_| {
                StoreReadError::new(
                    StoreSide::Target,
                    StoreErrorKind::InvalidData,
                    format!("unknown page token `{token}`"),
                )
            })?,
            None => 0,
        };
        let page_size = self.max_results.max(1);

        let mut visible = self
            .tasks
            .iter()
            .filter(|task| include_completed || !task.completed)
            .skip(offset);
        let tasks: Vec<TaskRecord> = visible
            .by_ref()
            .take(page_size)
            .map(RemoteTask::to_record)
            .collect();
        let next_page_token = visible
            .next()
            .map(|_| (offset + tasks.len()).to_string());

        Ok(TaskPage {
            tasks,
            next_page_token,
        })
    }
}

impl TargetStore for MemoryTargetStore {
    fn list_all(&self, include_completed: bool) -> ReadResult<Vec<TaskRecord>> {
        let mut tasks = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.list_page(include_completed, page_token.as_deref())?;
            tasks.extend(page.tasks);
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => return Ok(tasks),
            }
        }
    }

    fn create(&mut self, task: &NewTargetTask) -> WriteResult<TargetId> {
        let id = TargetId::new(Uuid::new_v4().to_string());
        self.tasks.push(RemoteTask {
            id: id.clone(),
            title: task.title.clone(),
            notes: task.notes.clone(),
            due: task.due_date.map(due_timestamp),
            completed: false,
        });
        Ok(id)
    }

    fn update_notes(&mut self, target_id: &TargetId, notes: &str) -> WriteResult<()> {
        self.task_mut(target_id)?.notes = notes.to_string();
        Ok(())
    }

    fn repair_link(&mut self, target_id: &TargetId, source_id: &SourceId) -> WriteResult<()> {
        let task = self.task_mut(target_id)?;
        task.notes = rewrite_source_marker(&task.notes, source_id);
        Ok(())
    }
}
