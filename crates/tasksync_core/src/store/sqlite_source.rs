//! SQLite-backed source store over the notes database `tasks` table.
//!
//! # Responsibility
//! - Map `tasks` rows into `TaskRecord` values.
//! - Persist sync state, remark markers and the mirrored completed flag.
//!
//! # Invariants
//! - Unsynced listing order is creation order (`created_at`, then rowid).
//! - Writes addressing a missing row fail with `NotFound`.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::link::marker::target_marker;
use crate::model::task::{normalize_title, SourceId, SyncState, TargetId, TaskRecord};
use crate::store::{
    ReadResult, SourceStore, StoreErrorKind, StoreReadError, StoreSide, StoreWriteError,
    WriteResult,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Params, Row};
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    source_id,
    title,
    due_date,
    sync_state,
    remark,
    completed
FROM tasks";

const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Source store reading and writing the `tasks` table.
pub struct SqliteSourceStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSourceStore<'conn> {
    /// Wraps a migrated connection (see `db::open_db`).
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Authors a new unsynced task and returns its stable id.
    pub fn create_task(&self, title: &str, due_date: Option<NaiveDate>) -> WriteResult<SourceId> {
        let source_id = SourceId::new(Uuid::new_v4().to_string());
        self.conn
            .execute(
                "INSERT INTO tasks (source_id, title, due_date) VALUES (?1, ?2, ?3);",
                params![
                    source_id.as_str(),
                    title,
                    due_date.map(|date| date.format(DUE_DATE_FORMAT).to_string()),
                ],
            )
            .map_err(|err| write_error(source_id.as_str(), &err))?;
        Ok(source_id)
    }

    /// Gets one task by id.
    pub fn get_task(&self, source_id: &SourceId) -> ReadResult<Option<TaskRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE source_id = ?1;"))
            .map_err(|err| read_error(&err))?;
        let row = stmt
            .query_row([source_id.as_str()], |row| Ok(parse_task_row(row)))
            .optional()
            .map_err(|err| read_error(&err))?;
        row.transpose()
    }

    fn query_tasks(&self, sql: &str) -> ReadResult<Vec<TaskRecord>> {
        let mut stmt = self.conn.prepare(sql).map_err(|err| read_error(&err))?;
        let mut rows = stmt.query([]).map_err(|err| read_error(&err))?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next().map_err(|err| read_error(&err))? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }

    fn update_one(&self, source_id: &SourceId, sql: &str, values: impl Params) -> WriteResult<()> {
        let changed = self
            .conn
            .execute(sql, values)
            .map_err(|err| write_error(source_id.as_str(), &err))?;
        if changed == 0 {
            return Err(StoreWriteError::not_found(
                StoreSide::Source,
                source_id.as_str(),
            ));
        }
        Ok(())
    }
}

impl SourceStore for SqliteSourceStore<'_> {
    fn list_unsynced(&self) -> ReadResult<Vec<TaskRecord>> {
        self.query_tasks(&format!(
            "{TASK_SELECT_SQL} WHERE sync_state <> 'synced' ORDER BY created_at ASC, rowid ASC;"
        ))
    }

    fn list_all(&self) -> ReadResult<Vec<TaskRecord>> {
        self.query_tasks(&format!(
            "{TASK_SELECT_SQL} ORDER BY created_at ASC, rowid ASC;"
        ))
    }

    fn mark_synced(&mut self, source_id: &SourceId, target_id: &TargetId) -> WriteResult<()> {
        self.update_one(
            source_id,
            "UPDATE tasks
             SET
                sync_state = 'synced',
                remark = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE source_id = ?1;",
            params![source_id.as_str(), target_marker(target_id)],
        )
    }

    fn mark_completed(&mut self, source_id: &SourceId) -> WriteResult<()> {
        self.update_one(
            source_id,
            "UPDATE tasks
             SET
                completed = 1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE source_id = ?1;",
            params![source_id.as_str()],
        )
    }

    fn reset_sync_state(&mut self, source_id: &SourceId) -> WriteResult<()> {
        self.update_one(
            source_id,
            "UPDATE tasks
             SET
                sync_state = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE source_id = ?1;",
            params![source_id.as_str(), SyncState::Unsynced.as_str()],
        )
    }
}

fn parse_task_row(row: &Row<'_>) -> ReadResult<TaskRecord> {
    let source_id: String = row.get("source_id").map_err(|err| read_error(&err))?;
    let title: String = row.get("title").map_err(|err| read_error(&err))?;

    let due_date = match row
        .get::<_, Option<String>>("due_date")
        .map_err(|err| read_error(&err))?
    {
        Some(value) => Some(
            NaiveDate::parse_from_str(&value, DUE_DATE_FORMAT).map_err(|_| {
                invalid_data(format!("invalid due_date `{value}` in tasks.due_date"))
            })?,
        ),
        None => None,
    };

    let sync_text: String = row.get("sync_state").map_err(|err| read_error(&err))?;
    let sync_state = SyncState::parse(&sync_text).ok_or_else(|| {
        invalid_data(format!("invalid sync_state `{sync_text}` in tasks.sync_state"))
    })?;

    let completed = match row
        .get::<_, i64>("completed")
        .map_err(|err| read_error(&err))?
    {
        0 => false,
        1 => true,
        other => {
            return Err(invalid_data(format!(
                "invalid completed value `{other}` in tasks.completed"
            )));
        }
    };

    Ok(TaskRecord {
        source_id: Some(SourceId::new(source_id)),
        target_id: None,
        title: normalize_title(&title),
        due_date,
        sync_state,
        completed,
        link_text: row
            .get::<_, String>("remark")
            .map_err(|err| read_error(&err))?,
    })
}

fn classify(err: &rusqlite::Error) -> StoreErrorKind {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => StoreErrorKind::Throttled,
        Some(
            ErrorCode::PermissionDenied
            | ErrorCode::ReadOnly
            | ErrorCode::AuthorizationForStatementDenied,
        ) => StoreErrorKind::Unauthorized,
        _ => match err {
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..) => StoreErrorKind::InvalidData,
            _ => StoreErrorKind::Transport,
        },
    }
}

fn read_error(err: &rusqlite::Error) -> StoreReadError {
    StoreReadError::new(StoreSide::Source, classify(err), err.to_string())
}

fn write_error(record: &str, err: &rusqlite::Error) -> StoreWriteError {
    StoreWriteError::new(StoreSide::Source, classify(err), record, err.to_string())
}

fn invalid_data(message: String) -> StoreReadError {
    StoreReadError::new(StoreSide::Source, StoreErrorKind::InvalidData, message)
}
