//! Test Database Manager
//!
//! Provides isolated tracker instances for testing:
//! - Temporary data directories that are automatically cleaned up
//! - Pre-seeded catalogs and review histories
//! - Entry snapshots and restoration
//! - Reopening to simulate a restart

use lctrack_core::events::{Event, EventLog};
use lctrack_core::{
    Confidence, Difficulty, Entry, NewProblem, Problem, SchedulingState, Storage, TrackerPaths,
};
use tempfile::TempDir;

/// Manager for test databases
///
/// Each manager plays the role of one device: its own database and local
/// event log under a private data directory. Reviews go through the same
/// path the CLI uses (storage first, then the event log).
///
/// # Example
///
/// ```rust,ignore
/// let db = TestDatabaseManager::new_temp();
/// db.add_problem(1, "two-sum");
/// db.review(1, 5, T0);
/// // Directory is deleted when `db` goes out of scope
/// ```
pub struct TestDatabaseManager {
    /// The storage instance
    pub storage: Storage,
    /// Local event history
    pub log: EventLog,
    /// Resolved file locations
    paths: TrackerPaths,
    /// Temporary directory (kept alive to prevent premature deletion)
    _temp_dir: Option<TempDir>,
    /// Snapshot data for restore operations
    snapshot: Option<Vec<Entry>>,
}

impl TestDatabaseManager {
    /// Create a new tracker in a temporary directory
    pub fn new_temp() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let paths = TrackerPaths::new(temp_dir.path().join("data"));
        let mut manager = Self::open(paths);
        manager._temp_dir = Some(temp_dir);
        manager
    }

    /// Create a tracker rooted at `paths`; nothing is deleted on drop
    pub fn open(paths: TrackerPaths) -> Self {
        paths.ensure().expect("Failed to create data directory");
        let storage = Storage::new(Some(paths.database())).expect("Failed to create test storage");
        let log = EventLog::open(paths.local_history());

        Self {
            storage,
            log,
            paths,
            _temp_dir: None,
            snapshot: None,
        }
    }

    /// Resolved file locations
    pub fn paths(&self) -> &TrackerPaths {
        &self.paths
    }

    /// Drop and reopen the storage, as a new process would
    pub fn reopen(&mut self) {
        self.storage =
            Storage::new(Some(self.paths.database())).expect("Failed to reopen test storage");
    }

    /// Check if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.storage
            .get_stats(0)
            .map(|s| s.total_problems == 0)
            .unwrap_or(true)
    }

    /// Number of stored entries, orphans included
    pub fn entry_count(&self) -> i64 {
        self.storage
            .get_stats(0)
            .map(|s| s.total_entries)
            .unwrap_or(0)
    }

    /// Current cached state of a problem
    pub fn state(&self, problem_id: i64) -> SchedulingState {
        self.storage
            .get_scheduling_state(problem_id)
            .expect("Failed to read state")
            .expect("Problem not found")
    }

    // ========================================================================
    // WORKFLOW
    // ========================================================================

    /// Register an active problem, due at `T0`
    pub fn add_problem(&self, id: i64, slug: &str) -> Problem {
        self.storage
            .add_problem(
                NewProblem {
                    id,
                    slug: slug.to_string(),
                    title: None,
                    difficulty: Difficulty::Medium,
                    active: true,
                },
                crate::T0,
            )
            .expect("Failed to add problem")
    }

    /// Log a review at `ts` and append it to the local history
    pub fn review(&self, problem_id: i64, confidence: i64, ts: i64) -> Entry {
        let confidence = Confidence::new(confidence).expect("Invalid confidence");
        let entry = Entry::new(problem_id, confidence, ts);
        self.storage
            .record_entry(&entry, ts)
            .expect("Failed to record entry");
        self.log
            .append(&Event::add_entry(&entry))
            .expect("Failed to append event");
        entry
    }

    /// Remove a review and append the removal to the local history
    pub fn remove(&self, entry_id: &str, ts: i64) -> Option<SchedulingState> {
        let removal = self
            .storage
            .remove_entry(entry_id, ts)
            .expect("Failed to remove entry")
            .expect("Entry not found");
        self.log
            .append(&Event::rm_entry(entry_id, ts))
            .expect("Failed to append event");
        removal.state
    }

    // ========================================================================
    // SEEDING METHODS
    // ========================================================================

    /// Seed the catalog with `count` active problems, ids from 1
    pub fn seed_problems(&self, count: usize) -> Vec<i64> {
        (1..=count as i64)
            .map(|id| self.add_problem(id, &format!("problem-{}", id)).id)
            .collect()
    }

    /// Seed problems in distinct review states
    ///
    /// Returns `[new, well_learned, struggling]`.
    pub fn seed_with_review_states(&self) -> Vec<i64> {
        let new = self.add_problem(101, "never-reviewed").id;

        let learned = self.add_problem(102, "well-learned").id;
        for (day, q) in [(0, 5), (1, 5), (7, 4)] {
            self.review(learned, q, crate::T0 + day * crate::DAY);
        }

        let struggling = self.add_problem(103, "struggling").id;
        for (day, q) in [(0, 1), (1, 2), (2, 0)] {
            self.review(struggling, q, crate::T0 + day * crate::DAY);
        }

        vec![new, learned, struggling]
    }

    // ========================================================================
    // SNAPSHOT/RESTORE
    // ========================================================================

    /// Take a snapshot of the entry table
    pub fn take_snapshot(&mut self) {
        self.snapshot = Some(self.storage.all_entries().unwrap_or_default());
    }

    /// Restore the last snapshot and rebuild every problem from it
    ///
    /// Entry ids are preserved.
    pub fn restore_snapshot(&mut self, now: i64) -> bool {
        match self.snapshot.take() {
            Some(entries) => self.storage.replace_entries(&entries, now).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_temp_is_empty() {
        let db = TestDatabaseManager::new_temp();
        assert!(db.is_empty());
        assert_eq!(db.entry_count(), 0);
    }

    #[test]
    fn test_seed_with_review_states() {
        let db = TestDatabaseManager::new_temp();
        let ids = db.seed_with_review_states();
        assert_eq!(ids.len(), 3);
        assert_eq!(db.entry_count(), 6);
        assert_eq!(db.log.load().unwrap().len(), 6);
        assert_eq!(db.state(ids[0]).last_review_at, None);
        assert_eq!(db.state(ids[1]).repetitions, 3);
        assert_eq!(db.state(ids[2]).repetitions, 0);
    }
}
