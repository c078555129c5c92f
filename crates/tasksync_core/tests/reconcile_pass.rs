use chrono::NaiveDate;
use rusqlite::Connection;
use std::collections::HashMap;
use tasksync_core::db::open_db_in_memory;
use tasksync_core::{
    parse_source_id, parse_target_id, AuditEntry, MemoryTargetStore, Reconciler, ResetReason,
    SourceId, SourceStore, SqliteSourceStore, SyncReport, SyncState, TargetId, TargetStore,
};

type Engine<'c> = Reconciler<SqliteSourceStore<'c>, MemoryTargetStore>;

fn engine(conn: &Connection) -> Engine<'_> {
    Reconciler::new(SqliteSourceStore::new(conn), MemoryTargetStore::new())
}

fn add_task(engine: &Engine<'_>, title: &str) -> SourceId {
    engine.source().create_task(title, None).unwrap()
}

fn linked_target(engine: &Engine<'_>, source_id: &SourceId) -> TargetId {
    let record = engine.source().get_task(source_id).unwrap().unwrap();
    parse_target_id(&record.link_text).unwrap()
}

#[test]
fn new_source_task_is_created_with_back_reference() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = engine(&conn);
    let source_id = add_task(&engine, "Buy milk");

    let report = engine.run_pass().unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.write_failures, 0);
    let record = engine.source().get_task(&source_id).unwrap().unwrap();
    assert_eq!(record.sync_state, SyncState::Synced);

    let target_id = parse_target_id(&record.link_text).unwrap();
    let remote = engine.target().get(&target_id).unwrap();
    assert_eq!(remote.title, "Buy milk");
    assert_eq!(parse_source_id(&remote.notes).unwrap(), source_id);
    assert_eq!(engine.target().tasks().len(), 1);
}

#[test]
fn due_date_is_carried_to_target() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = engine(&conn);
    let due = NaiveDate::from_ymd_opt(2026, 11, 2).unwrap();
    let source_id = engine
        .source()
        .create_task("File taxes", Some(due))
        .unwrap();

    engine.run_pass().unwrap();

    let target_id = linked_target(&engine, &source_id);
    let remote = engine.target().get(&target_id).unwrap();
    assert_eq!(remote.due.as_deref(), Some("2026-11-02T00:00:00.000Z"));
    let listed = engine.target().list_all(true).unwrap();
    assert_eq!(listed[0].due_date, Some(due));
}

#[test]
fn second_creation_phase_creates_nothing() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = engine(&conn);
    add_task(&engine, "Buy milk");
    add_task(&engine, "Call plumber");

    let mut first = SyncReport::default();
    engine.create_missing(&mut first).unwrap();
    let mut second = SyncReport::default();
    engine.create_missing(&mut second).unwrap();

    assert_eq!(first.created, 2);
    assert_eq!(second.created, 0);
    assert_eq!(second.skipped_duplicates, 0);
    assert_eq!(engine.target().tasks().len(), 2);
}

#[test]
fn repeated_full_pass_only_validates_links() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = engine(&conn);
    add_task(&engine, "Buy milk");
    add_task(&engine, "Call plumber");

    engine.run_pass().unwrap();
    let second = engine.run_pass().unwrap();

    assert_eq!(second.created, 0);
    assert_eq!(second.healthy_links, 2);
    assert_eq!(second.repaired_links, 0);
    assert_eq!(second.reset_links, 0);
    assert!(!second.has_warnings());
}

#[test]
fn small_listing_pages_do_not_hide_linked_tasks() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = Reconciler::new(
        SqliteSourceStore::new(&conn),
        MemoryTargetStore::with_max_results(1),
    );
    for title in ["A", "B", "C"] {
        add_task(&engine, title);
    }

    let first = engine.run_pass().unwrap();
    assert_eq!(first.created, 3);

    for _ in 0..3 {
        let report = engine.run_pass().unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(report.reset_links, 0);
        assert_eq!(report.skipped_duplicates, 0);
        assert_eq!(report.healthy_links, 3);
    }
    let titles: Vec<&str> = engine
        .target()
        .tasks()
        .iter()
        .map(|task| task.title.as_str())
        .collect();
    assert_eq!(titles, vec!["A", "B", "C"]);
}

#[test]
fn completion_past_the_first_page_is_mirrored() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = Reconciler::new(
        SqliteSourceStore::new(&conn),
        MemoryTargetStore::with_max_results(2),
    );
    for title in ["one", "two"] {
        engine.target_mut().insert_external(title, "");
    }
    let source_id = add_task(&engine, "three");
    engine.run_pass().unwrap();
    let target_id = linked_target(&engine, &source_id);
    engine.target_mut().complete(&target_id);

    let report = engine.run_pass().unwrap();

    assert_eq!(report.completions_propagated, 1);
    assert!(engine.source().get_task(&source_id).unwrap().unwrap().completed);
}

#[test]
fn same_title_is_created_once_per_pass() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = engine(&conn);
    let first = add_task(&engine, "Stretch");
    let second = add_task(&engine, "Stretch");

    let report = engine.run_pass().unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.skipped_duplicates, 1);
    assert_eq!(engine.target().tasks().len(), 1);
    let first_state = engine.source().get_task(&first).unwrap().unwrap().sync_state;
    let second_state = engine.source().get_task(&second).unwrap().unwrap().sync_state;
    assert_eq!(first_state, SyncState::Synced);
    assert_eq!(second_state, SyncState::Unsynced);
}

#[test]
fn titles_already_in_target_are_skipped_and_left_unsynced() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = engine(&conn);
    engine.target_mut().insert_external("Daily review", "");
    let first = add_task(&engine, "Daily review");
    let second = add_task(&engine, "Daily review");

    let report = engine.run_pass().unwrap();

    assert_eq!(report.created, 0);
    assert_eq!(report.skipped_duplicates, 2);
    assert_eq!(engine.target().tasks().len(), 1);
    for source_id in [first, second] {
        let record = engine.source().get_task(&source_id).unwrap().unwrap();
        assert_eq!(record.sync_state, SyncState::Unsynced);
    }
    let skipped = report
        .entries
        .iter()
        .filter(|entry| matches!(entry, AuditEntry::SkippedDuplicate { .. }))
        .count();
    assert_eq!(skipped, 2);
}

#[test]
fn deleted_target_resets_link_with_warning() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = engine(&conn);
    let source_id = add_task(&engine, "Renew passport");
    engine.run_pass().unwrap();
    let target_id = linked_target(&engine, &source_id);
    assert!(engine.target_mut().delete(&target_id));

    let mut report = SyncReport::default();
    engine.validate_links(&mut report).unwrap();

    assert_eq!(report.reset_links, 1);
    assert_eq!(report.warnings().count(), 1);
    assert!(matches!(
        &report.entries[0],
        AuditEntry::Reset { reason: ResetReason::TargetMissing(id), .. } if *id == target_id
    ));
    let record = engine.source().get_task(&source_id).unwrap().unwrap();
    assert_eq!(record.sync_state, SyncState::Unsynced);
}

#[test]
fn reset_record_is_recreated_in_the_same_pass() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = engine(&conn);
    let source_id = add_task(&engine, "Renew passport");
    engine.run_pass().unwrap();
    let old_target = linked_target(&engine, &source_id);
    engine.target_mut().delete(&old_target);

    let report = engine.run_pass().unwrap();

    assert_eq!(report.reset_links, 1);
    assert_eq!(report.created, 1);
    let new_target = linked_target(&engine, &source_id);
    assert_ne!(new_target, old_target);
    assert_eq!(
        engine.source().get_task(&source_id).unwrap().unwrap().sync_state,
        SyncState::Synced
    );
}

#[test]
fn synced_record_without_remark_marker_is_reset() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO tasks (source_id, title, sync_state, remark)
         VALUES ('s-legacy', 'Legacy', 'synced', 'uploaded by hand');",
        [],
    )
    .unwrap();
    let mut engine = engine(&conn);

    let mut report = SyncReport::default();
    engine.validate_links(&mut report).unwrap();

    assert_eq!(report.reset_links, 1);
    assert!(matches!(
        &report.entries[0],
        AuditEntry::Reset {
            reason: ResetReason::NoMarker,
            ..
        }
    ));
}

#[test]
fn lost_back_reference_is_repaired_without_recreating() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = engine(&conn);
    let source_id = add_task(&engine, "Book dentist");
    engine.run_pass().unwrap();
    let target_id = linked_target(&engine, &source_id);
    engine
        .target_mut()
        .update_notes(&target_id, "call before noon")
        .unwrap();

    let report = engine.run_pass().unwrap();

    assert_eq!(report.repaired_links, 1);
    assert_eq!(report.created, 0);
    assert_eq!(report.reset_links, 0);
    assert_eq!(engine.target().tasks().len(), 1);
    let notes = &engine.target().get(&target_id).unwrap().notes;
    assert!(notes.starts_with("call before noon"));
    assert_eq!(parse_source_id(notes).unwrap(), source_id);
}

#[test]
fn target_completion_is_mirrored_and_stays_mirrored() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = engine(&conn);
    let source_id = add_task(&engine, "Water plants");
    engine.run_pass().unwrap();
    let target_id = linked_target(&engine, &source_id);

    engine.target_mut().complete(&target_id);
    let report = engine.run_pass().unwrap();
    assert_eq!(report.completions_propagated, 1);
    assert!(engine.source().get_task(&source_id).unwrap().unwrap().completed);

    let again = engine.run_pass().unwrap();
    assert_eq!(again.completions_propagated, 0);
    assert_eq!(again.already_completed, 1);

    engine.target_mut().reopen(&target_id);
    engine.run_pass().unwrap();
    assert!(engine.source().get_task(&source_id).unwrap().unwrap().completed);
}

#[test]
fn completion_falls_back_to_remark_lookup() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = engine(&conn);
    let source_id = add_task(&engine, "Pay rent");
    engine.run_pass().unwrap();
    let target_id = linked_target(&engine, &source_id);
    engine.target_mut().update_notes(&target_id, "").unwrap();
    engine.target_mut().complete(&target_id);

    let mut report = SyncReport::default();
    engine.propagate_completions(&mut report).unwrap();

    assert_eq!(report.completions_propagated, 1);
    assert_eq!(report.unresolved_completions, 0);
    assert!(engine.source().get_task(&source_id).unwrap().unwrap().completed);
}

#[test]
fn completed_task_for_vanished_source_is_unresolved() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = engine(&conn);
    let ghost = engine
        .target_mut()
        .insert_external("Ghost", "Source Task ID: no-such-record");
    engine.target_mut().complete(&ghost);
    let source_id = add_task(&engine, "Real task");
    engine.run_pass().unwrap();
    let real = linked_target(&engine, &source_id);
    engine.target_mut().complete(&real);

    let report = engine.run_pass().unwrap();

    assert_eq!(report.unresolved_completions, 1);
    assert_eq!(report.completions_propagated, 1);
    assert!(report.warnings().any(|entry| matches!(
        entry,
        AuditEntry::Unresolved { target_id, .. } if *target_id == ghost
    )));
}

#[test]
fn synced_records_are_resolvable_or_reported_after_every_pass() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = engine(&conn);
    let ids: Vec<SourceId> = ["a", "b", "c", "d"]
        .iter()
        .map(|title| add_task(&engine, title))
        .collect();
    engine.run_pass().unwrap();

    let a_target = linked_target(&engine, &ids[0]);
    let b_target = linked_target(&engine, &ids[1]);
    engine.target_mut().delete(&a_target);
    engine.target_mut().update_notes(&b_target, "").unwrap();
    let report = engine.run_pass().unwrap();

    let targets = engine.target().list_all(true).unwrap();
    let linked: HashMap<SourceId, TargetId> = targets
        .iter()
        .filter_map(|task| {
            let source_id = parse_source_id(&task.link_text).ok()?;
            Some((source_id, task.target_id.clone()?))
        })
        .collect();
    for record in engine.source().list_all().unwrap() {
        if record.is_synced() {
            let source_id = record.source_id.unwrap();
            assert!(linked.contains_key(&source_id), "{source_id} lost its link");
        }
    }
    assert_eq!(report.reset_links, 1);
    assert_eq!(report.repaired_links, 1);
}
