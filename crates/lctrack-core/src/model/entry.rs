//! Entry - one logged review of a problem

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sm2::Confidence;

/// An immutable review event
///
/// Entries are the source of truth for scheduling: a problem's state is the
/// replay of its entries, ordered by `(ts, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Unique identifier (UUID v4), also the tie-break for equal timestamps
    pub id: String,
    /// Problem the review belongs to
    pub problem_id: i64,
    /// Self-assessed confidence
    pub confidence: Confidence,
    /// Unix timestamp (seconds) of the review
    pub ts: i64,
}

impl Entry {
    /// Create an entry with a fresh identifier
    pub fn new(problem_id: i64, confidence: Confidence, ts: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            problem_id,
            confidence,
            ts,
        }
    }

    /// Create an entry with a known identifier (imports, merges, tests)
    pub fn with_id(id: impl Into<String>, problem_id: i64, confidence: Confidence, ts: i64) -> Self {
        Self {
            id: id.into(),
            problem_id,
            confidence,
            ts,
        }
    }

    /// Replay order key
    pub fn replay_key(&self) -> (i64, &str) {
        (self.ts, self.id.as_str())
    }
}
