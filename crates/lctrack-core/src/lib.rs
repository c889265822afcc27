//! # lctrack Core
//!
//! Spaced repetition scheduling for coding practice problems, built on SM-2.
//!
//! - **Scheduler**: the pure SM-2 step, `(state, confidence) -> state`
//! - **Replay**: a problem's state is reconstructed from its full entry history,
//!   ordered by `(timestamp, entry id)`, so it never depends on insertion order
//! - **Storage**: SQLite with transactional record / remove / rebuild
//! - **Event log**: JSONL add/remove history used to merge devices
//! - **Sync**: union of local and backup histories, committed to a git repo
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lctrack_core::prelude::*;
//!
//! let storage = Storage::new(None)?;
//! let now = chrono::Utc::now().timestamp();
//!
//! storage.add_problem(NewProblem { id: 1, slug: "two-sum".into(), active: true, ..Default::default() }, now)?;
//!
//! let entry = Entry::new(1, Confidence::new(4)?, now);
//! let state = storage.record_entry(&entry, now)?;
//! println!("next review in {}", format_interval(state.interval));
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod events;
pub mod model;
pub mod paths;
pub mod sm2;
pub mod storage;
pub mod sync;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Model types
pub use model::{Difficulty, Entry, NewProblem, Problem, TrackerStats};

// SM-2 algorithm
pub use sm2::{
    advance, format_interval, rebuild_states, recompute, Confidence, Rebuild, ScheduleError,
    SchedulingState, Sm2State,
};

// Storage layer
pub use storage::{EntryRemoval, RebuildReport, Result, Storage, StorageError};

// Event log
pub use events::{materialize, merge_histories, Event, EventLog, EventLogError};

// Backup sync
pub use sync::{sync, BackupRepo, CommitInfo, SyncError, SyncReport};

pub use paths::TrackerPaths;

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        format_interval, Confidence, Difficulty, Entry, Event, EventLog, NewProblem, Problem,
        Result, SchedulingState, Storage, StorageError, TrackerPaths,
    };
}
