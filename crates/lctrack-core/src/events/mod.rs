//! Event Log Module
//!
//! Append-only history of entry mutations, used to carry reviews between
//! devices:
//! - One JSON event per line (JSONL)
//! - `ADD_ENTRY` / `RM_ENTRY` events, each with its own identifier
//! - Merging is a union deduplicated by event id
//! - Materializing a history yields the entry set the database should hold

mod log;

pub use log::{materialize, merge_histories, EventLog};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Entry;
use crate::sm2::Confidence;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Event log error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A line that is not a valid event
    #[error("Failed to parse line {line} of {path}: {source}")]
    Parse {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    /// Serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Event log result type
pub type Result<T> = std::result::Result<T, EventLogError>;

// ============================================================================
// EVENTS
// ============================================================================

/// A single mutation of the entry set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    /// An entry was logged
    AddEntry {
        id: String,
        ts: i64,
        entry_id: String,
        problem_id: i64,
        confidence: Confidence,
    },
    /// An entry was removed
    RmEntry {
        id: String,
        ts: i64,
        target_entry_id: String,
    },
}

impl Event {
    /// Event recording that `entry` was logged
    ///
    /// The event carries the review timestamp, so backfilled entries keep
    /// their original time after a merge.
    pub fn add_entry(entry: &Entry) -> Self {
        Event::AddEntry {
            id: Uuid::new_v4().to_string(),
            ts: entry.ts,
            entry_id: entry.id.clone(),
            problem_id: entry.problem_id,
            confidence: entry.confidence,
        }
    }

    /// Event recording that the entry `entry_id` was removed at `ts`
    pub fn rm_entry(entry_id: &str, ts: i64) -> Self {
        Event::RmEntry {
            id: Uuid::new_v4().to_string(),
            ts,
            target_entry_id: entry_id.to_string(),
        }
    }

    /// Event identifier, the deduplication key when merging
    pub fn id(&self) -> &str {
        match self {
            Event::AddEntry { id, .. } | Event::RmEntry { id, .. } => id,
        }
    }

    /// The entry this event adds or removes
    pub fn entry_id(&self) -> &str {
        match self {
            Event::AddEntry { entry_id, .. } => entry_id,
            Event::RmEntry {
                target_entry_id, ..
            } => target_entry_id,
        }
    }

    /// When the event happened
    pub fn ts(&self) -> i64 {
        match self {
            Event::AddEntry { ts, .. } | Event::RmEntry { ts, .. } => *ts,
        }
    }
}
