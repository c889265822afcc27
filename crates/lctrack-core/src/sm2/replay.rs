//! State reconstruction by replaying entry histories
//!
//! A problem's `SchedulingState` is never trusted on its own: it is whatever
//! folding `advance` over the problem's entries produces. Replays sort by
//! `(ts, id)` so two machines holding the same entry set always arrive at the
//! same state, whatever order the entries were inserted, deleted or merged in.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::Entry;

use super::algorithm::{advance, Sm2State};
use super::state::SchedulingState;

/// Sort entries into replay order: timestamp ascending, then identifier
pub fn sort_entries(entries: &mut [Entry]) {
    entries.sort_by(|a, b| a.replay_key().cmp(&b.replay_key()));
}

/// Reconstruct a problem's state from its complete entry history
///
/// `entries` may be in any order. An empty history yields the reset state,
/// due at `now`. `now` is not consulted otherwise.
pub fn recompute(entries: &[Entry], now: i64) -> SchedulingState {
    let mut ordered: Vec<&Entry> = entries.iter().collect();
    ordered.sort_by(|a, b| a.replay_key().cmp(&b.replay_key()));

    let Some(last) = ordered.last() else {
        return SchedulingState::reset(now);
    };
    let last_ts = last.ts;

    let sm2 = ordered
        .iter()
        .fold(Sm2State::default(), |state, entry| advance(state, entry.confidence));

    SchedulingState::reviewed(sm2, last_ts)
}

/// Result of rebuilding every problem from a full entry set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rebuild {
    /// Recomputed state per known problem
    pub states: BTreeMap<i64, SchedulingState>,
    /// Entries whose problem is not known, left untouched
    pub orphaned: Vec<String>,
}

/// Recompute the state of every known problem from `entries`
///
/// Known problems without entries get the reset state. Entries that reference
/// an unknown problem are reported as orphans and do not affect any state.
pub fn rebuild_states<I>(entries: &[Entry], problems: I, now: i64) -> Rebuild
where
    I: IntoIterator<Item = i64>,
{
    let known: BTreeSet<i64> = problems.into_iter().collect();

    let mut grouped: BTreeMap<i64, Vec<Entry>> = known.iter().map(|id| (*id, Vec::new())).collect();
    let mut orphaned = Vec::new();

    for entry in entries {
        match grouped.get_mut(&entry.problem_id) {
            Some(history) => history.push(entry.clone()),
            None => orphaned.push(entry.id.clone()),
        }
    }

    if !orphaned.is_empty() {
        tracing::warn!(
            count = orphaned.len(),
            "Skipping entries that reference unknown problems"
        );
    }

    let states = grouped
        .into_iter()
        .map(|(problem_id, history)| (problem_id, recompute(&history, now)))
        .collect();

    Rebuild { states, orphaned }
}
