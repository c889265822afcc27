//! Model module - problems and the review entries that schedule them

mod entry;
mod problem;

pub use entry::Entry;
pub use problem::{slugify, title_from_slug, Difficulty, NewProblem, Problem};

use serde::{Deserialize, Serialize};

/// Summary counts for the whole tracker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerStats {
    /// Problems in the catalog
    pub total_problems: i64,
    /// Problems in the active study set
    pub active_problems: i64,
    /// Active problems due at the time of the query
    pub due_problems: i64,
    /// Logged entries, including orphans
    pub total_entries: i64,
    /// Entries whose problem is not in the catalog
    pub orphaned_entries: i64,
    /// Timestamp of the most recent entry
    pub last_review_at: Option<i64>,
}
