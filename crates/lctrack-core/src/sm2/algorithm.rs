//! SM-2 Algorithm
//!
//! The single step of the SuperMemo 2 scheduler. `advance` is a total,
//! side-effect free function: given the same state and rating it always
//! produces the same (bit-identical) result, which is what makes replaying a
//! history reproducible across machines.
//!
//! Confidence ratings (0-5):
//! - 0: Complete blackout, could not start
//! - 1: Wrong approach, recognised the solution afterwards
//! - 2: Wrong approach, but the solution felt familiar
//! - 3: Solved with serious difficulty
//! - 4: Solved after some hesitation
//! - 5: Solved cleanly with no hesitation

use serde::{Deserialize, Serialize};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Easiness factor of a problem that has never been reviewed
pub const INITIAL_EASINESS: f64 = 2.5;

/// Lower bound of the easiness factor
pub const MIN_EASINESS: f64 = 1.3;

/// Highest accepted confidence rating
pub const MAX_CONFIDENCE: u8 = 5;

/// Ratings at or above this value count as a successful review
pub const QUALIFYING_CONFIDENCE: u8 = 3;

/// Interval days are converted to timestamps with this factor, never anything else
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Longest interval in days the scheduler will produce
pub const MAX_INTERVAL: u32 = u32::MAX;

// ============================================================================
// ERRORS
// ============================================================================

/// Rejected scheduler input
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// Confidence outside the inclusive 0-5 range
    #[error("Invalid confidence {0}: must be between 0 and 5")]
    InvalidConfidence(i64),
}

// ============================================================================
// CONFIDENCE
// ============================================================================

/// A validated confidence rating in `0..=5`
///
/// Out-of-range values cannot be constructed, so `advance` never sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Confidence(u8);

impl Confidence {
    /// Validate a raw rating
    pub fn new(value: i64) -> Result<Self, ScheduleError> {
        if (0..=MAX_CONFIDENCE as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ScheduleError::InvalidConfidence(value))
        }
    }

    /// Raw rating value
    pub fn value(self) -> u8 {
        self.0
    }

    /// Whether the review counts towards the repetition streak
    pub fn is_qualifying(self) -> bool {
        self.0 >= QUALIFYING_CONFIDENCE
    }

    /// All valid ratings, lowest first
    pub fn all() -> impl Iterator<Item = Confidence> {
        (0..=MAX_CONFIDENCE).map(Confidence)
    }
}

impl TryFrom<i64> for Confidence {
    type Error = ScheduleError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Confidence> for u8 {
    fn from(confidence: Confidence) -> Self {
        confidence.0
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.0, MAX_CONFIDENCE)
    }
}

// ============================================================================
// SM-2 STATE
// ============================================================================

/// The three numbers SM-2 carries from one review to the next
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sm2State {
    /// Consecutive qualifying reviews since the last reset (n)
    pub repetitions: u32,
    /// Easiness factor (EF), never below `MIN_EASINESS`
    pub easiness: f64,
    /// Interval in whole days (I)
    pub interval: u32,
}

impl Default for Sm2State {
    fn default() -> Self {
        Self {
            repetitions: 0,
            easiness: INITIAL_EASINESS,
            interval: 0,
        }
    }
}

// ============================================================================
// ALGORITHM
// ============================================================================

/// Interval after a qualifying review
///
/// Uses `f64::round`, i.e. halves round away from zero (12.5 -> 13). The
/// product is never negative, so this is round-half-up. Intervals stop
/// growing at `MAX_INTERVAL` days.
pub fn next_interval(repetitions: u32, interval: u32, easiness: f64) -> u32 {
    match repetitions {
        0 => 1,
        1 => 6,
        _ => {
            let days = (f64::from(interval) * easiness).round();
            if days >= f64::from(MAX_INTERVAL) {
                MAX_INTERVAL
            } else {
                days as u32
            }
        }
    }
}

/// Advance the SM-2 state by one review
///
/// The interval is computed from the easiness *before* this review's update.
pub fn advance(state: Sm2State, confidence: Confidence) -> Sm2State {
    let (repetitions, interval) = if confidence.is_qualifying() {
        (
            state.repetitions.saturating_add(1),
            next_interval(state.repetitions, state.interval, state.easiness),
        )
    } else {
        (0, 1)
    };

    // EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02))
    let miss = (MAX_CONFIDENCE - confidence.value()) as f64;
    let easiness = (state.easiness + (0.1 - miss * (0.08 + miss * 0.02))).max(MIN_EASINESS);

    Sm2State {
        repetitions,
        easiness,
        interval,
    }
}

/// Format an interval in days as a short human-readable string
pub fn format_interval(days: u32) -> String {
    match days {
        0 => "now".to_string(),
        1..=6 => format!("{}d", days),
        7..=29 => format!("{}w", days / 7),
        30..=364 => format!("{}mo", days / 30),
        _ => format!("{}y", days / 365),
    }
}

// ============================================================================
// TESTS
// ============================================================================
