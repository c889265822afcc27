//! lctrack CLI
//!
//! Command-line interface for scheduling coding practice problems with SM-2.

mod display;

use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use lctrack_core::model::slugify;
use lctrack_core::sm2::{advance, Sm2State};
use lctrack_core::sync::{sync, BackupRepo, LAST_SYNC_KEY};
use lctrack_core::{
    format_interval, Confidence, Difficulty, Entry, Event, EventLog, NewProblem, Storage,
    TrackerPaths,
};

use display::{format_ts, print_problem_row, print_state};

/// lctrack - spaced repetition for coding practice problems
#[derive(Parser)]
#[command(name = "lctrack")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Schedule reviews of coding practice problems with SM-2")]
#[command(long_about = "lctrack keeps a local catalog of practice problems and schedules each one \
with the SM-2 spaced repetition algorithm.\n\nEvery review is logged as an entry; a problem's \
schedule is always the replay of its entries, so deleting entries or merging histories from \
another machine never leaves it inconsistent.")]
struct Cli {
    /// Data directory (defaults to $LCTRACK_DATA_DIR, then the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a problem in the local catalog
    AddProblem {
        /// Problem number
        id: i64,
        /// URL slug, e.g. two-sum
        slug: String,
        /// Display title (derived from the slug when omitted)
        #[arg(long)]
        title: Option<String>,
        /// easy, medium or hard
        #[arg(long, default_value = "easy")]
        difficulty: Difficulty,
        /// Add straight to the active study set
        #[arg(long)]
        active: bool,
    },

    /// Add a problem to the active study set
    Activate {
        /// Problem number
        id: i64,
    },

    /// Remove a problem from the active study set
    Deactivate {
        /// Problem number
        id: i64,
    },

    /// List the active study set
    ShowActive,

    /// List active problems due for review, most overdue first
    Due,

    /// Pick the next problem to study
    Study,

    /// Show a problem and its schedule
    Details {
        /// Problem number
        id: i64,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Log a review of a problem
    AddEntry {
        /// Problem number
        id: i64,
        /// Confidence 0-5 (>= 3 counts as a successful review)
        #[arg(long, short, allow_negative_numbers = true)]
        confidence: i64,
        /// Review time as a Unix timestamp (defaults to now)
        #[arg(long)]
        at: Option<i64>,
    },

    /// Delete a logged review and reschedule its problem
    RmEntry {
        /// Entry id
        entry_id: String,
    },

    /// Show every review of a problem with the schedule after each one
    History {
        /// Problem number
        id: i64,
    },

    /// Recompute every problem's schedule from its entries
    Rebuild,

    /// Merge the local history with the backup repository
    Sync,

    /// Show tracker statistics
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a full backup of the SQLite database
    Backup {
        /// Output file path for the backup
        output: PathBuf,
    },
}

/// Open handles for one command
struct App {
    paths: TrackerPaths,
    storage: Storage,
    log: EventLog,
}

impl App {
    fn open(data_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let paths = TrackerPaths::resolve(data_dir)?;
        paths.ensure()?;
        tracing::debug!("Using data directory {:?}", paths.data_dir());

        let storage = Storage::new(Some(paths.database()))?;
        let log = EventLog::open(paths.local_history());
        Ok(Self { paths, storage, log })
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is for command output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    let app = App::open(cli.data_dir)?;
    let now = Utc::now().timestamp();

    match cli.command {
        Commands::AddProblem {
            id,
            slug,
            title,
            difficulty,
            active,
        } => run_add_problem(&app, id, slug, title, difficulty, active, now),
        Commands::Activate { id } => run_set_active(&app, id, true),
        Commands::Deactivate { id } => run_set_active(&app, id, false),
        Commands::ShowActive => run_show_active(&app, now),
        Commands::Due => run_due(&app, now),
        Commands::Study => run_study(&app, now),
        Commands::Details { id, json } => run_details(&app, id, json, now),
        Commands::AddEntry { id, confidence, at } => run_add_entry(&app, id, confidence, at, now),
        Commands::RmEntry { entry_id } => run_rm_entry(&app, &entry_id, now),
        Commands::History { id } => run_history(&app, id),
        Commands::Rebuild => run_rebuild(&app, now),
        Commands::Sync => run_sync(&app, now),
        Commands::Stats { json } => run_stats(&app, json, now),
        Commands::Backup { output } => run_backup(&app, output),
    }
}

// ============================================================================
// PROBLEMS
// ============================================================================

fn run_add_problem(
    app: &App,
    id: i64,
    slug: String,
    title: Option<String>,
    difficulty: Difficulty,
    active: bool,
    now: i64,
) -> anyhow::Result<()> {
    if app.storage.get_problem(id)?.is_some() {
        anyhow::bail!("Problem {} already exists", id);
    }

    let slug = problem_slug(&slug)?;
    let problem = app.storage.add_problem(
        NewProblem {
            id,
            slug,
            title,
            difficulty,
            active,
        },
        now,
    )?;

    println!(
        "{}",
        format!("Added problem {}: {}", problem.id, problem.title)
            .green()
            .bold()
    );
    if problem.state.last_review_at.is_some() {
        println!("  Restored schedule from existing entries");
        print_state(&problem.state, now);
    }
    Ok(())
}

/// Normalized slug, rejected when nothing usable is left
fn problem_slug(raw: &str) -> anyhow::Result<String> {
    let slug = slugify(raw);
    if !slug.chars().any(|c| c.is_ascii_alphanumeric()) {
        anyhow::bail!("Slug {:?} must contain at least one letter or digit", raw);
    }
    Ok(slug)
}

fn run_set_active(app: &App, id: i64, active: bool) -> anyhow::Result<()> {
    app.storage.set_active(id, active)?;
    let verb = if active { "Activated" } else { "Deactivated" };
    println!("{} problem {}", verb, id);
    Ok(())
}

fn run_show_active(app: &App, now: i64) -> anyhow::Result<()> {
    let problems = app.storage.list_active()?;

    println!("{}", "=== Active Problems ===".cyan().bold());
    println!();

    if problems.is_empty() {
        println!("{}", "No active problems. Use `lctrack activate <id>`.".dimmed());
        return Ok(());
    }

    for problem in &problems {
        print_problem_row(problem, now);
    }
    println!();
    println!("{} active", problems.len());
    Ok(())
}

fn run_due(app: &App, now: i64) -> anyhow::Result<()> {
    let due = app.storage.due_problems(now)?;

    println!("{}", "=== Due for Review ===".cyan().bold());
    println!();

    if due.is_empty() {
        println!("{}", "Nothing due. Come back later.".dimmed());
        return Ok(());
    }

    for problem in &due {
        print_problem_row(problem, now);
    }
    println!();
    println!("{} due", due.len());
    Ok(())
}

fn run_study(app: &App, now: i64) -> anyhow::Result<()> {
    let due = app.storage.due_problems(now)?;
    let Some(problem) = due.first() else {
        println!("{}", "Nothing due. Come back later.".dimmed());
        return Ok(());
    };

    println!("{}", "=== Next Problem ===".cyan().bold());
    println!();
    println!("{}: {} ({})", "Problem".white().bold(), problem.title, problem.id);
    println!("{}: {}", "Difficulty".white().bold(), problem.difficulty);
    println!(
        "{}: https://leetcode.com/problems/{}/",
        "Link".white().bold(),
        problem.slug
    );
    print_state(&problem.state, now);
    println!();
    println!(
        "{}",
        format!(
            "When done: lctrack add-entry {} --confidence <0-5>",
            problem.id
        )
        .dimmed()
    );
    Ok(())
}

fn run_details(app: &App, id: i64, json: bool, now: i64) -> anyhow::Result<()> {
    let Some(problem) = app.storage.get_problem(id)? else {
        anyhow::bail!("Problem {} not found", id);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&problem)?);
        return Ok(());
    }

    let entries = app.storage.get_entries(id)?;

    println!("{}", format!("=== {} ===", problem.title).cyan().bold());
    println!();
    println!("{}: {}", "Id".white().bold(), problem.id);
    println!("{}: {}", "Slug".white().bold(), problem.slug);
    println!("{}: {}", "Difficulty".white().bold(), problem.difficulty);
    println!(
        "{}: {}",
        "Active".white().bold(),
        if problem.active { "yes" } else { "no" }
    );
    println!("{}: {}", "Reviews".white().bold(), entries.len());
    print_state(&problem.state, now);
    Ok(())
}

// ============================================================================
// ENTRIES
// ============================================================================

fn run_add_entry(
    app: &App,
    id: i64,
    confidence: i64,
    at: Option<i64>,
    now: i64,
) -> anyhow::Result<()> {
    let confidence = Confidence::new(confidence)?;
    let reviewed_at = review_time(at, now)?;
    if app.storage.get_problem(id)?.is_none() {
        anyhow::bail!("Problem {} not found", id);
    }

    let entry = Entry::new(id, confidence, reviewed_at);
    let state = app.storage.record_entry(&entry, now)?;
    app.log.append(&Event::add_entry(&entry))?;

    println!(
        "{}",
        format!("Logged {} for problem {}", confidence, id)
            .green()
            .bold()
    );
    println!("  {} {}", "Entry:".dimmed(), entry.id);
    println!(
        "  {} {} ({})",
        "Next review:".dimmed(),
        format_ts(state.next_review_at),
        format_interval(state.interval)
    );
    Ok(())
}

/// Validated review timestamp: `--at` when given, otherwise `now`
fn review_time(at: Option<i64>, now: i64) -> anyhow::Result<i64> {
    let ts = at.unwrap_or(now);
    if DateTime::from_timestamp(ts, 0).is_none() {
        anyhow::bail!("Review time {} is outside the supported date range", ts);
    }
    Ok(ts)
}

fn run_rm_entry(app: &App, entry_id: &str, now: i64) -> anyhow::Result<()> {
    let Some(removal) = app.storage.remove_entry(entry_id, now)? else {
        anyhow::bail!("Entry {} not found", entry_id);
    };
    app.log.append(&Event::rm_entry(entry_id, now))?;

    println!(
        "Removed entry {} ({} on {})",
        entry_id,
        removal.entry.confidence,
        format_ts(removal.entry.ts)
    );
    match removal.state {
        Some(state) => print_state(&state, now),
        None => println!(
            "  {}",
            format!("Problem {} is not in the catalog", removal.entry.problem_id).dimmed()
        ),
    }
    Ok(())
}

fn run_history(app: &App, id: i64) -> anyhow::Result<()> {
    let Some(problem) = app.storage.get_problem(id)? else {
        anyhow::bail!("Problem {} not found", id);
    };
    let entries = app.storage.get_entries(id)?;

    println!("{}", format!("=== History: {} ===", problem.title).cyan().bold());
    println!();

    if entries.is_empty() {
        println!("{}", "No reviews logged.".dimmed());
        return Ok(());
    }

    let mut sm2 = Sm2State::default();
    for entry in &entries {
        sm2 = advance(sm2, entry.confidence);
        println!(
            "{}  {}  n={:<3} EF={:.2}  I={:<5} {}",
            format_ts(entry.ts),
            entry.confidence,
            sm2.repetitions,
            sm2.easiness,
            format_interval(sm2.interval),
            entry.id.dimmed()
        );
    }
    Ok(())
}

// ============================================================================
// MAINTENANCE
// ============================================================================

fn run_rebuild(app: &App, now: i64) -> anyhow::Result<()> {
    println!("{}", "=== Rebuild ===".cyan().bold());
    println!();

    let report = app.storage.rebuild_all(now)?;
    println!("{}: {}", "Problems".white().bold(), report.problems);
    println!("{}: {}", "Entries".white().bold(), report.entries);
    if !report.orphaned.is_empty() {
        println!(
            "{}",
            format!(
                "{} entries reference unknown problems and were kept as-is",
                report.orphaned.len()
            )
            .yellow()
        );
    }
    Ok(())
}

fn run_sync(app: &App, now: i64) -> anyhow::Result<()> {
    println!("{}", "=== Sync ===".cyan().bold());
    println!();

    let repo = BackupRepo::open_or_init(app.paths.backup_dir())?;
    let report = sync(&app.storage, &app.log, &repo, now)?;

    println!("{}: {}", "Local events".white().bold(), report.local_events);
    println!("{}: {}", "Backup events".white().bold(), report.backup_events);
    println!("{}: {}", "Merged events".white().bold(), report.merged_events);
    println!("{}: {}", "Entries".white().bold(), report.entries);
    println!("{}: {}", "Problems rebuilt".white().bold(), report.problems_rebuilt);
    if report.recovered > 0 {
        println!(
            "{}",
            format!(
                "{} stored entries were missing from the history and have been logged",
                report.recovered
            )
            .yellow()
        );
    }
    if !report.orphaned.is_empty() {
        println!(
            "{}",
            format!(
                "{} entries reference problems missing from this catalog",
                report.orphaned.len()
            )
            .yellow()
        );
    }

    println!();
    match report.commit {
        Some(commit) => println!(
            "{}",
            format!("Committed {} to {}", commit.short_id, repo.dir().display())
                .green()
                .bold()
        ),
        None => println!("{}", "Backup already up to date".green()),
    }
    Ok(())
}

fn run_stats(app: &App, json: bool, now: i64) -> anyhow::Result<()> {
    let stats = app.storage.get_stats(now)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", "=== lctrack Statistics ===".cyan().bold());
    println!();
    println!("{}: {}", "Problems".white().bold(), stats.total_problems);
    println!("{}: {}", "Active".white().bold(), stats.active_problems);
    println!("{}: {}", "Due Now".white().bold(), stats.due_problems);
    println!("{}: {}", "Entries".white().bold(), stats.total_entries);
    if stats.orphaned_entries > 0 {
        println!("{}: {}", "Orphaned Entries".white().bold(), stats.orphaned_entries);
    }
    if let Some(ts) = stats.last_review_at {
        println!("{}: {}", "Last Review".white().bold(), format_ts(ts));
    }
    if let Some(ts) = app
        .storage
        .get_app_state(LAST_SYNC_KEY)?
        .and_then(|value| value.parse::<i64>().ok())
    {
        println!("{}: {}", "Last Sync".white().bold(), format_ts(ts));
    }
    println!("{}: {}", "Data Directory".white().bold(), app.paths.data_dir().display());
    Ok(())
}

fn run_backup(app: &App, output: PathBuf) -> anyhow::Result<()> {
    println!("{}", "=== lctrack Backup ===".cyan().bold());
    println!();

    if output.exists() {
        anyhow::bail!("Refusing to overwrite existing file: {}", output.display());
    }

    // Create parent directories if needed
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
    }

    println!("  {} {}", "From:".dimmed(), app.paths.database().display());
    println!("  {}   {}", "To:".dimmed(), output.display());
    app.storage.backup_to(&output)?;

    let file_size = std::fs::metadata(&output)?.len();
    let size_display = if file_size >= 1024 * 1024 {
        format!("{:.2} MB", file_size as f64 / (1024.0 * 1024.0))
    } else if file_size >= 1024 {
        format!("{:.1} KB", file_size as f64 / 1024.0)
    } else {
        format!("{} bytes", file_size)
    };

    println!();
    println!(
        "{}",
        format!("Backup complete: {} ({})", output.display(), size_display)
            .green()
            .bold()
    );
    Ok(())
}
