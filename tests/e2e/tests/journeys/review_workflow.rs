//! Review Workflow Journey
//!
//! A single device registering problems, logging reviews, correcting
//! mistakes and restarting.

use lctrack_core::sm2::recompute;
use lctrack_core::{Confidence, Entry, SchedulingState};
use lctrack_e2e_tests::{TestDataFactory, TestDatabaseManager, DAY, T0};

#[test]
fn test_perfect_streak_schedules_out() {
    let db = TestDatabaseManager::new_temp();
    db.add_problem(1, "two-sum");

    let first = db.storage.record_entry(&TestDataFactory::perfect_streak(1)[0], T0).unwrap();
    assert_eq!((first.repetitions, first.interval), (1, 1));

    for entry in &TestDataFactory::perfect_streak(1)[1..] {
        db.storage.record_entry(entry, entry.ts).unwrap();
    }

    let state = db.state(1);
    assert_eq!(state.repetitions, 3);
    assert_eq!(state.interval, 16);
    assert_eq!(state.next_review_at, T0 + 8 * DAY + 16 * DAY);
}

#[test]
fn test_lapse_resets_streak() {
    let db = TestDatabaseManager::new_temp();
    db.add_problem(1, "two-sum");

    let mut observed = Vec::new();
    for entry in TestDataFactory::lapse_and_recover(1) {
        let state = db.storage.record_entry(&entry, entry.ts).unwrap();
        observed.push((state.repetitions, state.interval));
    }
    assert_eq!(observed, vec![(1, 1), (0, 1), (1, 1)]);
}

#[test]
fn test_due_queue_follows_reviews() {
    let db = TestDatabaseManager::new_temp();
    let ids = db.seed_problems(3);

    // Every new problem is due immediately
    assert_eq!(db.storage.due_problems(T0).unwrap().len(), 3);

    db.review(ids[0], 5, T0);
    let due: Vec<i64> = db.storage.due_problems(T0).unwrap().iter().map(|p| p.id).collect();
    assert_eq!(due, vec![ids[1], ids[2]]);

    // A day later the reviewed problem is back, after the longer-waiting ones
    let due: Vec<i64> = db
        .storage
        .due_problems(T0 + DAY)
        .unwrap()
        .iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(due, vec![ids[1], ids[2], ids[0]]);

    db.storage.set_active(ids[1], false).unwrap();
    assert_eq!(db.storage.due_problems(T0 + DAY).unwrap().len(), 2);
}

#[test]
fn test_removing_a_mistaken_review() {
    let db = TestDatabaseManager::new_temp();
    db.add_problem(1, "two-sum");

    db.review(1, 5, T0);
    db.review(1, 5, T0 + DAY);
    let mistake = db.review(1, 0, T0 + 2 * DAY);
    assert_eq!(db.state(1).repetitions, 0);

    let state = db.remove(&mistake.id, T0 + 3 * DAY).unwrap();
    assert_eq!((state.repetitions, state.interval), (2, 6));
    assert_eq!(db.state(1), state);

    let events = db.log.load().unwrap();
    assert_eq!(events.len(), 4);
}

#[test]
fn test_removing_every_review_resets() {
    let db = TestDatabaseManager::new_temp();
    db.add_problem(1, "two-sum");
    let only = db.review(1, 4, T0);

    let state = db.remove(&only.id, T0 + DAY).unwrap();
    assert_eq!(state, SchedulingState::reset(T0 + DAY));
    assert!(state.is_due(T0 + DAY));
}

#[test]
fn test_backfilled_review_is_replayed_in_order() {
    let db = TestDatabaseManager::new_temp();
    db.add_problem(1, "two-sum");

    db.review(1, 5, T0 + 5 * DAY);
    db.review(1, 1, T0);

    let state = db.state(1);
    let replayed = recompute(&db.storage.get_entries(1).unwrap(), T0);
    assert_eq!(state, replayed);
    assert_eq!((state.repetitions, state.interval), (1, 1));
    assert_eq!(state.last_review_at, Some(T0 + 5 * DAY));
}

#[test]
fn test_invalid_confidence_is_rejected_before_scheduling() {
    assert!(Confidence::new(6).is_err());
    assert!(Confidence::new(-1).is_err());
    assert!(Confidence::new(0).is_ok());
    assert!(Confidence::new(5).is_ok());
}

#[test]
fn test_state_survives_restart() {
    let mut db = TestDatabaseManager::new_temp();
    let ids = db.seed_with_review_states();
    let before: Vec<SchedulingState> = ids.iter().map(|id| db.state(*id)).collect();

    db.reopen();

    let after: Vec<SchedulingState> = ids.iter().map(|id| db.state(*id)).collect();
    assert_eq!(before, after);
}

#[test]
fn test_live_state_always_matches_full_rebuild() {
    let db = TestDatabaseManager::new_temp();
    let ids = db.seed_with_review_states();
    db.review(ids[0], 3, T0 + 3 * DAY);
    db.review(ids[2], 4, T0 + DAY / 2);

    let live: Vec<SchedulingState> = ids.iter().map(|id| db.state(*id)).collect();
    let report = db.storage.rebuild_all(T0).unwrap();
    assert_eq!(report.problems, 3);
    assert!(report.orphaned.is_empty());

    let rebuilt: Vec<SchedulingState> = ids.iter().map(|id| db.state(*id)).collect();
    assert_eq!(live, rebuilt);
}

#[test]
fn test_snapshot_restore_preserves_ids_and_states() {
    let mut db = TestDatabaseManager::new_temp();
    let ids = db.seed_with_review_states();
    let expected: Vec<SchedulingState> = ids.iter().map(|id| db.state(*id)).collect();

    db.take_snapshot();
    db.review(ids[1], 0, T0 + 30 * DAY);
    assert_ne!(db.state(ids[1]), expected[1]);

    assert!(db.restore_snapshot(T0));
    let restored: Vec<SchedulingState> = ids.iter().map(|id| db.state(*id)).collect();
    assert_eq!(restored[1..], expected[1..]);
    assert_eq!(db.entry_count(), 6);
}

#[test]
fn test_backup_copy_is_usable() {
    let db = TestDatabaseManager::new_temp();
    db.add_problem(1, "two-sum");
    db.review(1, 4, T0);

    let backup_path = db.paths().data_dir().join("copy.db");
    db.storage.backup_to(&backup_path).unwrap();

    let copy = lctrack_core::Storage::new(Some(backup_path)).unwrap();
    assert_eq!(copy.get_entries(1).unwrap().len(), 1);
    assert_eq!(copy.get_scheduling_state(1).unwrap(), Some(db.state(1)));
}

#[test]
fn test_event_log_lines_are_plain_json() {
    let db = TestDatabaseManager::new_temp();
    db.add_problem(1, "two-sum");
    let entry: Entry = db.review(1, 4, T0);

    let raw = std::fs::read_to_string(db.log.path()).unwrap();
    let line: serde_json::Value = serde_json::from_str(raw.trim()).unwrap();
    assert_eq!(line["event"], "ADD_ENTRY");
    assert_eq!(line["entry_id"], entry.id.as_str());
    assert_eq!(line["ts"], T0);
}
