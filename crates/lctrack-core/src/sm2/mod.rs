//! SM-2 (SuperMemo 2) Scheduling Module
//!
//! The scheduling engine behind every problem's review date.
//!
//! ## Pieces
//! - `algorithm`: the pure `advance` step and the confidence rating type
//! - `state`: the per-problem `SchedulingState` projection
//! - `replay`: reconstructing state from a full entry history
//!
//! ## Core Formulas
//! - Qualifying review (q >= 3): I = 1, then 6, then round(I * EF)
//! - Failed review (q < 3): n = 0, I = 1
//! - EF' = max(1.3, EF + (0.1 - (5 - q) * (0.08 + (5 - q) * 0.02)))

mod algorithm;
mod replay;
mod state;

pub use algorithm::{
    advance, format_interval, next_interval, Confidence, ScheduleError, Sm2State,
    INITIAL_EASINESS, MAX_CONFIDENCE, MAX_INTERVAL, MIN_EASINESS, QUALIFYING_CONFIDENCE, SECONDS_PER_DAY,
};

pub use replay::{rebuild_states, recompute, sort_entries, Rebuild};

pub use state::SchedulingState;

/// Result type for scheduler input validation
pub type Result<T> = std::result::Result<T, ScheduleError>;
