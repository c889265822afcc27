//! Sync Module
//!
//! Merges the local event history with the copy kept in the backup
//! repository, then rebuilds the database from the merged entry set.
//!
//! ## Steps
//! 1. Load both histories and take their union (deduplicated by event id)
//! 2. Log an `ADD_ENTRY` for every stored entry neither history mentions
//! 3. Write the merged history back to both files
//! 4. Materialize the entry set and rebuild every problem by replay
//! 5. Commit the backup history if it changed

mod repo;

pub use repo::{BackupRepo, CommitInfo, BACKUP_HISTORY_FILE};

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::{materialize, merge_histories, Event, EventLog, EventLogError};
use crate::storage::{Storage, StorageError};

/// App state key holding the time of the last successful sync
pub const LAST_SYNC_KEY: &str = "last_sync_at";

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Sync error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Git error
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    /// Event log error
    #[error("Event log error: {0}")]
    EventLog(#[from] EventLogError),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sync result type
pub type Result<T> = std::result::Result<T, SyncError>;

/// What a sync did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Events in the local history before merging
    pub local_events: usize,
    /// Events in the backup history before merging
    pub backup_events: usize,
    /// Stored entries missing from both histories, logged during this sync
    pub recovered: usize,
    /// Events after merging
    pub merged_events: usize,
    /// Entries the merged history materializes to
    pub entries: usize,
    /// Problems whose state was rebuilt
    pub problems_rebuilt: usize,
    /// Entries referencing unknown problems, kept in storage
    pub orphaned: Vec<String>,
    /// Backup commit, `None` when the history was already up to date
    pub commit: Option<CommitInfo>,
}

/// Merge local and backup histories and rebuild `storage` from the result
pub fn sync(storage: &Storage, local: &EventLog, repo: &BackupRepo, now: i64) -> Result<SyncReport> {
    let backup = repo.event_log();

    let local_events = local.load()?;
    let backup_events = backup.load()?;
    let (local_count, backup_count) = (local_events.len(), backup_events.len());

    let merged = merge_histories(local_events, backup_events);
    let unlogged = unlogged_entries(storage, &merged)?;
    let recovered = unlogged.len();
    let merged = if unlogged.is_empty() {
        merged
    } else {
        tracing::warn!(count = recovered, "Logging stored entries missing from the history");
        merge_histories(merged, unlogged)
    };

    local.write_all(&merged)?;
    backup.write_all(&merged)?;

    let entries = materialize(&merged);
    let rebuild = storage.replace_entries(&entries, now)?;

    let when = DateTime::<Utc>::from_timestamp(now, 0).unwrap_or_else(Utc::now);
    let commit = repo.commit_history(&format!(
        "Sync {} events at {}",
        merged.len(),
        when.format("%Y-%m-%d %H:%M:%S UTC")
    ))?;

    storage.set_app_state(LAST_SYNC_KEY, &now.to_string())?;

    tracing::info!(
        local = local_count,
        backup = backup_count,
        merged = merged.len(),
        entries = entries.len(),
        "Sync complete"
    );

    Ok(SyncReport {
        local_events: local_count,
        backup_events: backup_count,
        recovered,
        merged_events: merged.len(),
        entries: entries.len(),
        problems_rebuilt: rebuild.problems,
        orphaned: rebuild.orphaned,
        commit,
    })
}

/// `ADD_ENTRY` events for stored entries that no event in `history` mentions
///
/// An entry can reach the database without reaching the log when the append
/// fails after the write. Replacing the entry table would drop it silently.
fn unlogged_entries(storage: &Storage, history: &[Event]) -> Result<Vec<Event>> {
    let mentioned: HashSet<&str> = history.iter().map(Event::entry_id).collect();
    Ok(storage
        .all_entries()?
        .iter()
        .filter(|entry| !mentioned.contains(entry.id.as_str()))
        .map(Event::add_entry)
        .collect())
}
