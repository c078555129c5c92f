//! Schema migrations for the `tasks` table.
//!
//! # Responsibility
//! - Bring a notes database up to the task schema the source store reads.
//! - Refuse databases whose `tasks` table lacks a column the store needs,
//!   such as one rebuilt by another tool after migration.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//! - Every required task column exists once `apply_migrations` returns `Ok`.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "create_tasks",
    sql: include_str!("0001_init.sql"),
}];

/// Columns `SqliteSourceStore` selects or updates.
pub const REQUIRED_TASK_COLUMNS: &[&str] = &[
    "source_id",
    "title",
    "due_date",
    "sync_state",
    "remark",
    "completed",
    "created_at",
    "updated_at",
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies pending migrations, then checks the `tasks` columns.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version < latest {
        let tx = conn.transaction()?;
        for migration in MIGRATIONS
            .iter()
            .filter(|migration| migration.version > current_version)
        {
            tx.execute_batch(migration.sql)?;
            tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
            info!(
                "event=db_migrate module=db status=applied version={} name={}",
                migration.version, migration.name
            );
        }
        tx.commit()?;

        info!(
            "event=db_migrate module=db status=ok from_version={} to_version={}",
            current_version, latest
        );
    }

    verify_tasks_schema(conn)
}

/// Fails with `MissingColumn` for the first required column `tasks` lacks.
pub fn verify_tasks_schema(conn: &Connection) -> DbResult<()> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('tasks');")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    match REQUIRED_TASK_COLUMNS
        .iter()
        .copied()
        .find(|required| !columns.iter().any(|column| column == required))
    {
        Some(column) => {
            error!(
                "event=db_schema_check module=db status=error table=tasks missing_column={column}"
            );
            Err(DbError::MissingColumn {
                table: "tasks",
                column,
            })
        }
        None => Ok(()),
    }
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
