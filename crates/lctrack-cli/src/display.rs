//! Terminal formatting helpers

use chrono::{DateTime, Local};
use colored::Colorize;

use lctrack_core::sm2::SECONDS_PER_DAY;
use lctrack_core::{format_interval, Problem, SchedulingState};

const SECONDS_PER_HOUR: i64 = 3_600;

/// Local date and time of a Unix timestamp
pub fn format_ts(ts: i64) -> String {
    match DateTime::from_timestamp(ts, 0) {
        Some(utc) => utc.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        None => ts.to_string(),
    }
}

/// "due in 3d", "due in 5h", "due now", "overdue by 3d"
pub fn due_label(state: &SchedulingState, now: i64) -> String {
    if !state.is_due(now) {
        return match state.days_until_due(now) {
            0 => match state.next_review_at.saturating_sub(now) / SECONDS_PER_HOUR {
                0 => "due in <1h".to_string(),
                hours => format!("due in {}h", hours),
            },
            days => format!("due in {}d", days),
        };
    }
    match now.saturating_sub(state.next_review_at) / SECONDS_PER_DAY {
        0 => "due now".to_string(),
        days => format!("overdue by {}d", days),
    }
}

/// One line per problem in list views
pub fn print_problem_row(problem: &Problem, now: i64) {
    let due = due_label(&problem.state, now);
    let due = if problem.state.is_due(now) {
        due.yellow()
    } else {
        due.normal()
    };
    println!(
        "{:>5}  {:<40} {:<6}  n={:<3} EF={:.2}  {}",
        problem.id,
        problem.title,
        problem.difficulty.as_str(),
        problem.state.repetitions,
        problem.state.easiness,
        due
    );
}

/// Scheduling block for details / study views
pub fn print_state(state: &SchedulingState, now: i64) {
    println!("{}: {}", "Repetitions".white().bold(), state.repetitions);
    println!("{}: {:.2}", "Easiness".white().bold(), state.easiness);
    println!(
        "{}: {}",
        "Interval".white().bold(),
        format_interval(state.interval)
    );
    match state.last_review_at {
        Some(ts) => println!("{}: {}", "Last Review".white().bold(), format_ts(ts)),
        None => println!("{}: never", "Last Review".white().bold()),
    }
    println!(
        "{}: {} ({})",
        "Next Review".white().bold(),
        format_ts(state.next_review_at),
        due_label(state, now)
    );
}
