//! Scheduling state - the cached projection of a problem's review history

use serde::{Deserialize, Serialize};

use super::algorithm::{advance, Confidence, Sm2State, INITIAL_EASINESS, SECONDS_PER_DAY};

/// Current spaced repetition state of one problem
///
/// Always derivable from the problem's entries; storage only caches it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingState {
    /// Consecutive qualifying reviews since the last reset (n)
    pub repetitions: u32,
    /// Easiness factor (EF), >= 1.3
    pub easiness: f64,
    /// Interval in whole days (I)
    pub interval: u32,
    /// Timestamp of the last contributing entry, `None` without entries
    pub last_review_at: Option<i64>,
    /// Unix timestamp (seconds) when the problem is next due
    pub next_review_at: i64,
}

impl SchedulingState {
    /// State of a problem without any entries: immediately due at `now`
    pub fn reset(now: i64) -> Self {
        Self {
            repetitions: 0,
            easiness: INITIAL_EASINESS,
            interval: 0,
            last_review_at: None,
            next_review_at: now,
        }
    }

    /// State after a review at `reviewed_at` produced `sm2`
    ///
    /// `next_review_at` saturates at `i64::MAX` instead of overflowing.
    pub fn reviewed(sm2: Sm2State, reviewed_at: i64) -> Self {
        // u32::MAX days in seconds fits comfortably in i64
        let delay = i64::from(sm2.interval) * SECONDS_PER_DAY;
        Self {
            repetitions: sm2.repetitions,
            easiness: sm2.easiness,
            interval: sm2.interval,
            last_review_at: Some(reviewed_at),
            next_review_at: reviewed_at.saturating_add(delay),
        }
    }

    /// The SM-2 triple carried between reviews
    pub fn sm2(&self) -> Sm2State {
        Sm2State {
            repetitions: self.repetitions,
            easiness: self.easiness,
            interval: self.interval,
        }
    }

    /// Incremental fast path: apply one new review on top of this state
    ///
    /// Returns `None` when `reviewed_at` is not strictly after the last
    /// review. Such an entry may sort before existing ones, so the caller must
    /// fall back to a full `recompute`.
    pub fn advance(&self, confidence: Confidence, reviewed_at: i64) -> Option<Self> {
        match self.last_review_at {
            Some(last) if reviewed_at <= last => None,
            _ => Some(Self::reviewed(advance(self.sm2(), confidence), reviewed_at)),
        }
    }

    /// Whether the problem is due for review at `now`
    pub fn is_due(&self, now: i64) -> bool {
        self.next_review_at <= now
    }

    /// Whole days until the problem is due (negative when overdue)
    pub fn days_until_due(&self, now: i64) -> i64 {
        self.next_review_at
            .saturating_sub(now)
            .div_euclid(SECONDS_PER_DAY)
    }
}
