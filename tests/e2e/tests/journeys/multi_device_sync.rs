//! Multi-Device Sync Journey
//!
//! Two trackers sharing one backup repository. Each syncs in turn; both must
//! end with the same entries and bit-identical schedules.

use lctrack_core::sm2::recompute;
use lctrack_core::sync::{sync, BackupRepo, SyncReport};
use lctrack_core::SchedulingState;
use lctrack_e2e_tests::{TestDataFactory, TestDatabaseManager, DAY, T0};
use tempfile::TempDir;

struct Devices {
    laptop: TestDatabaseManager,
    desktop: TestDatabaseManager,
    backup_dir: TempDir,
}

impl Devices {
    fn new() -> Self {
        let laptop = TestDatabaseManager::new_temp();
        let desktop = TestDatabaseManager::new_temp();
        for device in [&laptop, &desktop] {
            device.add_problem(1, "two-sum");
            device.add_problem(2, "valid-parentheses");
        }
        Self {
            laptop,
            desktop,
            backup_dir: TempDir::new().unwrap(),
        }
    }

    fn sync(&self, device: &TestDatabaseManager, now: i64) -> SyncReport {
        let repo = BackupRepo::open_or_init(self.backup_dir.path()).unwrap();
        sync(&device.storage, &device.log, &repo, now).unwrap()
    }
}

fn states(device: &TestDatabaseManager) -> Vec<SchedulingState> {
    [1, 2].iter().map(|id| device.state(*id)).collect()
}

#[test]
fn test_interleaved_reviews_converge() {
    let devices = Devices::new();

    devices.laptop.review(1, 5, T0);
    devices.desktop.review(1, 4, T0 + DAY);
    devices.desktop.review(2, 3, T0 + DAY);

    let first = devices.sync(&devices.laptop, T0 + 2 * DAY);
    assert_eq!(first.local_events, 1);
    assert_eq!(first.backup_events, 0);
    assert!(first.commit.is_some());

    let second = devices.sync(&devices.desktop, T0 + 2 * DAY);
    assert_eq!(second.merged_events, 3);
    assert_eq!(second.entries, 3);

    devices.sync(&devices.laptop, T0 + 2 * DAY);

    assert_eq!(states(&devices.laptop), states(&devices.desktop));
    let merged = devices.laptop.state(1);
    assert_eq!((merged.repetitions, merged.interval), (2, 6));
    for (a, b) in states(&devices.laptop).iter().zip(states(&devices.desktop).iter()) {
        assert_eq!(a.easiness.to_bits(), b.easiness.to_bits());
    }
}

#[test]
fn test_merged_history_matches_single_device() {
    let devices = Devices::new();
    devices.laptop.review(1, 5, T0);
    devices.desktop.review(1, 4, T0 + DAY);

    devices.sync(&devices.laptop, T0 + 2 * DAY);
    devices.sync(&devices.desktop, T0 + 2 * DAY);

    let single = TestDatabaseManager::new_temp();
    single.add_problem(1, "two-sum");
    single.review(1, 5, T0);
    single.review(1, 4, T0 + DAY);

    assert_eq!(devices.desktop.state(1), single.state(1));
}

#[test]
fn test_removal_propagates() {
    let devices = Devices::new();
    let entry = devices.laptop.review(1, 5, T0);
    devices.laptop.review(1, 5, T0 + DAY);

    devices.sync(&devices.laptop, T0 + 2 * DAY);
    devices.sync(&devices.desktop, T0 + 2 * DAY);
    assert_eq!(devices.desktop.state(1).repetitions, 2);

    devices.desktop.remove(&entry.id, T0 + 3 * DAY);
    devices.sync(&devices.desktop, T0 + 3 * DAY);
    devices.sync(&devices.laptop, T0 + 3 * DAY);

    assert!(devices.laptop.storage.get_entry(&entry.id).unwrap().is_none());
    assert_eq!(devices.laptop.state(1).repetitions, 1);
    assert_eq!(states(&devices.laptop), states(&devices.desktop));
}

#[test]
fn test_sync_without_changes_does_not_commit() {
    let devices = Devices::new();
    devices.laptop.review(2, 4, T0);

    assert!(devices.sync(&devices.laptop, T0).commit.is_some());
    let again = devices.sync(&devices.laptop, T0);
    assert!(again.commit.is_none());
    assert_eq!(again.merged_events, 1);
}

#[test]
fn test_unknown_problem_entries_are_kept_and_adopted() {
    let devices = Devices::new();
    devices.laptop.add_problem(3, "lru-cache");
    devices.laptop.review(3, 5, T0);
    devices.laptop.review(3, 5, T0 + DAY);

    devices.sync(&devices.laptop, T0 + 2 * DAY);
    let report = devices.sync(&devices.desktop, T0 + 2 * DAY);

    // The desktop has never heard of problem 3
    assert_eq!(report.orphaned.len(), 2);
    assert_eq!(devices.desktop.entry_count(), 2);

    let adopted = devices.desktop.add_problem(3, "lru-cache");
    assert_eq!(adopted.state, devices.laptop.state(3));
}

#[test]
fn test_fresh_device_restores_from_backup() {
    let backup_dir = TempDir::new().unwrap();
    let repo = BackupRepo::open_or_init(backup_dir.path()).unwrap();
    let history = TestDataFactory::perfect_streak(70);
    repo.event_log()
        .write_all(&TestDataFactory::add_events(&history))
        .unwrap();

    let device = TestDatabaseManager::new_temp();
    TestDataFactory::create_problem(&device.storage, 70, "climbing-stairs", T0);

    let report = sync(&device.storage, &device.log, &repo, T0 + 30 * DAY).unwrap();
    assert_eq!((report.local_events, report.backup_events), (0, 3));
    assert_eq!(report.recovered, 0);
    assert_eq!(report.entries, 3);

    assert_eq!(device.state(70), recompute(&history, T0));
    assert_eq!(device.log.load().unwrap().len(), 3);
}
