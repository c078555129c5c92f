//! Command-line entry point for tasksync.
//!
//! # Responsibility
//! - Load settings from the environment and wire the stores to the engine.
//! - Persist the target snapshot between runs.
//!
//! # Invariants
//! - A pass that aborts exits non-zero and leaves the snapshot untouched.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::path::Path;
use std::process::ExitCode;
use tasksync_core::db::open_db;
use tasksync_core::{
    init_logging, run_pass_and_notify, LogNotifier, MemoryTargetStore, Notifier, Reconciler,
    SqliteSourceStore, SyncConfig, SyncReport, TargetId, TelegramNotifier,
};

/// Mirror notes-database tasks to a remote to-do list.
#[derive(Debug, Parser)]
#[command(name = "tasksync", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
enum Command {
    /// Run one reconciliation pass
    Sync,

    /// Author a new source task
    Add {
        /// Task title
        title: String,

        /// Due date as YYYY-MM-DD
        #[arg(value_parser = parse_due_date)]
        due_date: Option<NaiveDate>,
    },

    /// Mark a task completed in the target snapshot, as a remote edit would
    Complete {
        /// Identifier of the target task
        target_id: String,
    },

    /// Print the core crate version
    Ping,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli.command) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            error!("event=cli_run module=cli status=error error={message}");
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn parse_due_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|err| format!("expected YYYY-MM-DD, got `{value}`: {err}"))
}

fn run(command: Command) -> Result<String, String> {
    match command {
        Command::Ping => Ok(format!(
            "tasksync_core version={}",
            tasksync_core::core_version()
        )),
        Command::Sync => sync(&load_config()?),
        Command::Add { title, due_date } => {
            let config = load_config()?;
            let conn = open_db(&config.db_path).map_err(|err| err.to_string())?;
            let source_id = SqliteSourceStore::new(&conn)
                .create_task(&title, due_date)
                .map_err(|err| err.to_string())?;
            Ok(format!("added source task {source_id}"))
        }
        Command::Complete { target_id } => {
            let target_id = TargetId::new(target_id);
            let config = load_config()?;
            let mut target = load_target(&config.target_path)?;
            if !target.complete(&target_id) {
                return Err(format!("target task {target_id} does not exist"));
            }
            save_target(&config.target_path, &target)?;
            Ok(format!("completed target task {target_id}"))
        }
    }
}

/// Reads settings and starts file logging when a log dir is configured.
fn load_config() -> Result<SyncConfig, String> {
    let config = SyncConfig::from_env().map_err(|err| err.to_string())?;
    if let Some(log_dir) = &config.log_dir {
        let log_dir = log_dir
            .to_str()
            .ok_or_else(|| format!("log dir `{}` is not valid UTF-8", log_dir.display()))?;
        init_logging(&config.log_level, log_dir)?;
    }
    Ok(config)
}

fn sync(config: &SyncConfig) -> Result<String, String> {
    let conn = open_db(&config.db_path).map_err(|err| err.to_string())?;
    let mut target = load_target(&config.target_path)?;
    target.set_max_results(config.target_max_results);

    let notifier = select_notifier(config);
    let mut engine = Reconciler::new(SqliteSourceStore::new(&conn), target);
    let report =
        run_pass_and_notify(&mut engine, notifier.as_ref()).map_err(|err| err.to_string())?;

    let (_, target) = engine.into_parts();
    save_target(&config.target_path, &target)?;
    info!(
        "event=cli_run module=cli status=ok command=sync duration_ms={}",
        report.duration_ms
    );
    Ok(render_report(&report))
}

/// Telegram when configured; otherwise, or when the client cannot be built,
/// messages go to the log.
fn select_notifier(config: &SyncConfig) -> Box<dyn Notifier> {
    let Some(telegram) = &config.telegram else {
        return Box::new(LogNotifier);
    };
    match TelegramNotifier::new(&telegram.bot_token, &telegram.chat_id) {
        Ok(notifier) => Box::new(notifier),
        Err(err) => {
            warn!("event=notifier_init module=cli status=fallback channel=log error={err}");
            Box::new(LogNotifier)
        }
    }
}

fn render_report(report: &SyncReport) -> String {
    let mut lines = vec![format!(
        "created={} skipped={} repaired={} reset={} completed={} unresolved={} failures={}",
        report.created,
        report.skipped_duplicates,
        report.repaired_links,
        report.reset_links,
        report.completions_propagated,
        report.unresolved_completions,
        report.write_failures
    )];
    lines.extend(report.entries.iter().map(ToString::to_string));
    lines.join("\n")
}

/// A missing snapshot file reads as an empty remote list.
fn load_target(path: &Path) -> Result<MemoryTargetStore, String> {
    if !path.exists() {
        return Ok(MemoryTargetStore::new());
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read `{}`: {err}", path.display()))?;
    serde_json::from_str(&raw)
        .map_err(|err| format!("invalid target snapshot `{}`: {err}", path.display()))
}

fn save_target(path: &Path, target: &MemoryTargetStore) -> Result<(), String> {
    let raw = serde_json::to_string_pretty(target)
        .map_err(|err| format!("failed to encode target snapshot: {err}"))?;
    std::fs::write(path, raw)
        .map_err(|err| format!("failed to write `{}`: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::{load_target, save_target, Cli, Command};
    use chrono::NaiveDate;
    use clap::Parser;

    fn parse(args: &[&str]) -> Result<Command, clap::Error> {
        Cli::try_parse_from(std::iter::once("tasksync").chain(args.iter().copied()))
            .map(|cli| cli.command)
    }

    #[test]
    fn parses_known_commands() {
        assert_eq!(parse(&["sync"]).unwrap(), Command::Sync);
        assert_eq!(parse(&["ping"]).unwrap(), Command::Ping);
        assert_eq!(
            parse(&["add", "Buy milk"]).unwrap(),
            Command::Add {
                title: "Buy milk".to_string(),
                due_date: None,
            }
        );
        assert_eq!(
            parse(&["add", "Buy milk", "2026-11-02"]).unwrap(),
            Command::Add {
                title: "Buy milk".to_string(),
                due_date: NaiveDate::from_ymd_opt(2026, 11, 2),
            }
        );
        assert_eq!(
            parse(&["complete", "t-1"]).unwrap(),
            Command::Complete {
                target_id: "t-1".to_string(),
            }
        );
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["sync", "extra"]).is_err());
        assert!(parse(&["complete"]).is_err());
        let err = parse(&["add", "Buy milk", "tomorrow"]).unwrap_err();
        assert!(err.to_string().contains("tomorrow"));
    }

    #[test]
    fn target_snapshot_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remote.json");

        let mut target = load_target(&path).unwrap();
        assert!(target.tasks().is_empty());
        let id = target.insert_external("Buy milk", "Source Task ID: s-1");
        target.complete(&id);
        save_target(&path, &target).unwrap();

        let loaded = load_target(&path).unwrap();
        assert_eq!(loaded, target);
    }
}
