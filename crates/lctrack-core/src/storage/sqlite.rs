//! SQLite Storage Implementation
//!
//! Problems, their cached scheduling state, and the entry history the state
//! is derived from.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use directories::ProjectDirs;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{Difficulty, Entry, NewProblem, Problem, TrackerStats};
use crate::sm2::{rebuild_states, recompute, Confidence, ScheduleError, SchedulingState};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Storage error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Problem or entry not found
    #[error("Not found: {0}")]
    NotFound(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Initialization error
    #[error("Initialization error: {0}")]
    Init(String),
    /// Invalid scheduler input
    #[error("Invalid input: {0}")]
    Schedule(#[from] ScheduleError),
    /// Rejected problem or entry data
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Outcome of rebuilding every problem's state from the entry table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildReport {
    /// Problems whose state was recomputed
    pub problems: usize,
    /// Entries held after the rebuild, orphans included
    pub entries: usize,
    /// Entries referencing problems not in the catalog
    pub orphaned: Vec<String>,
}

/// An entry removed through `Storage::remove_entry`
#[derive(Debug, Clone, PartialEq)]
pub struct EntryRemoval {
    /// The deleted entry
    pub entry: Entry,
    /// Recomputed state of the owning problem, `None` for an orphan entry
    pub state: Option<SchedulingState>,
}

// ============================================================================
// STORAGE
// ============================================================================

const PROBLEM_COLUMNS: &str =
    "id, slug, title, difficulty, active, n, ef, i, last_review_at, next_review_at";

/// Main storage handle
///
/// Uses separate reader/writer connections. All methods take `&self`, so a
/// `Storage` can be shared behind an `Arc`. Every write that touches
/// scheduling state runs "fetch entries, recompute, persist" inside a single
/// transaction on the writer connection.
pub struct Storage {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

impl Storage {
    /// Apply PRAGMAs to a connection
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -16000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;

        Ok(())
    }

    /// Open the database at `db_path`, or in the platform data directory
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = match db_path {
            Some(p) => p,
            None => {
                let proj_dirs = ProjectDirs::from("com", "lctrack", "lctrack").ok_or_else(|| {
                    StorageError::Init("Could not determine project directories".to_string())
                })?;

                let data_dir = proj_dirs.data_dir();
                std::fs::create_dir_all(data_dir)?;
                // Restrict directory permissions to owner-only on Unix
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let perms = std::fs::Permissions::from_mode(0o700);
                    let _ = std::fs::set_permissions(data_dir, perms);
                }
                data_dir.join("lctrack.db")
            }
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let writer_conn = Connection::open(&path)?;

        // Restrict database file permissions to owner-only on Unix
        #[cfg(unix)]
        if path.exists() {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&path, perms);
        }

        Self::from_connections(writer_conn, || Connection::open(&path))
    }

    /// Private in-memory database, shared by the reader and writer connections
    pub fn open_in_memory() -> Result<Self> {
        let uri = format!("file:lctrack-{}?mode=memory&cache=shared", Uuid::new_v4());
        let flags = OpenFlags::default();
        let writer_conn = Connection::open_with_flags(&uri, flags)?;
        Self::from_connections(writer_conn, || Connection::open_with_flags(&uri, flags))
    }

    fn from_connections<F>(writer_conn: Connection, open_reader: F) -> Result<Self>
    where
        F: FnOnce() -> rusqlite::Result<Connection>,
    {
        Self::configure_connection(&writer_conn)?;

        // Apply migrations on writer only
        super::migrations::apply_migrations(&writer_conn)?;

        let reader_conn = open_reader()?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
        })
    }

    fn reader(&self) -> Result<MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| StorageError::Init("Reader lock poisoned".into()))
    }

    fn writer(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| StorageError::Init("Writer lock poisoned".into()))
    }

    // ========================================================================
    // PROBLEMS
    // ========================================================================

    /// Register a problem
    ///
    /// A problem without history is due at `now`. Entries already stored for
    /// this id (orphans from a merge) are adopted and replayed.
    pub fn add_problem(&self, input: NewProblem, now: i64) -> Result<Problem> {
        let title = input.display_title();
        let slug = input.slug.trim().to_string();
        if slug.is_empty() {
            return Err(StorageError::Validation(
                "Problem slug must not be empty".to_string(),
            ));
        }

        let mut writer = self.writer()?;
        let tx = writer.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let history = query_entries(&tx, input.id)?;
        let state = recompute(&history, now);

        tx.execute(
            "INSERT INTO problems (
                id, slug, title, difficulty, active,
                n, ef, i, last_review_at, next_review_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                input.id,
                slug,
                title,
                input.difficulty.code(),
                input.active,
                state.repetitions,
                state.easiness,
                state.interval,
                state.last_review_at,
                state.next_review_at,
            ],
        )?;
        tx.commit()?;

        if !history.is_empty() {
            tracing::info!(
                problem_id = input.id,
                entries = history.len(),
                "Adopted stored entries for new problem"
            );
        }

        Ok(Problem {
            id: input.id,
            slug,
            title,
            difficulty: input.difficulty,
            active: input.active,
            state,
        })
    }

    /// Get a problem by id
    pub fn get_problem(&self, id: i64) -> Result<Option<Problem>> {
        let reader = self.reader()?;
        query_problem(&reader, id)
    }

    /// Get a problem by slug
    pub fn get_problem_by_slug(&self, slug: &str) -> Result<Option<Problem>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(&format!(
            "SELECT {PROBLEM_COLUMNS} FROM problems WHERE slug = ?1"
        ))?;
        Ok(stmt.query_row(params![slug], row_to_problem).optional()?)
    }

    /// Every problem, by id
    pub fn list_problems(&self) -> Result<Vec<Problem>> {
        self.query_problems("SELECT {} FROM problems ORDER BY id", [])
    }

    /// Problems in the active study set, by id
    pub fn list_active(&self) -> Result<Vec<Problem>> {
        self.query_problems("SELECT {} FROM problems WHERE active = 1 ORDER BY id", [])
    }

    /// Active problems due at `now`, most overdue first
    pub fn due_problems(&self, now: i64) -> Result<Vec<Problem>> {
        self.query_problems(
            "SELECT {} FROM problems
             WHERE active = 1 AND next_review_at <= ?1
             ORDER BY next_review_at ASC, id ASC",
            [now],
        )
    }

    fn query_problems<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Problem>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(&sql.replacen("{}", PROBLEM_COLUMNS, 1))?;
        let problems = stmt
            .query_map(params, row_to_problem)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(problems)
    }

    /// Add to or remove from the active study set
    pub fn set_active(&self, id: i64, active: bool) -> Result<()> {
        let writer = self.writer()?;
        let rows = writer.execute(
            "UPDATE problems SET active = ?1 WHERE id = ?2",
            params![active, id],
        )?;
        if rows == 0 {
            return Err(StorageError::NotFound(format!("problem {}", id)));
        }
        Ok(())
    }

    /// Ids of every known problem
    pub fn problem_ids(&self) -> Result<Vec<i64>> {
        let reader = self.reader()?;
        query_problem_ids(&reader)
    }

    // ========================================================================
    // ENTRIES
    // ========================================================================

    /// Entries of one problem, in replay order
    pub fn get_entries(&self, problem_id: i64) -> Result<Vec<Entry>> {
        let reader = self.reader()?;
        query_entries(&reader, problem_id)
    }

    /// Get an entry by id
    pub fn get_entry(&self, id: &str) -> Result<Option<Entry>> {
        let reader = self.reader()?;
        query_entry(&reader, id)
    }

    /// Every stored entry, orphans included, in replay order
    pub fn all_entries(&self) -> Result<Vec<Entry>> {
        let reader = self.reader()?;
        let mut stmt =
            reader.prepare("SELECT id, problem_id, confidence, ts FROM entries ORDER BY ts, id")?;
        let entries = stmt
            .query_map([], row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Insert an entry without touching scheduling state
    ///
    /// Use `record_entry` to keep the problem's state in step.
    pub fn insert_entry(&self, entry: &Entry) -> Result<()> {
        let writer = self.writer()?;
        store_entry(&writer, entry)
    }

    /// Delete an entry without touching scheduling state
    ///
    /// Returns the owning problem id, or `None` when no such entry exists.
    pub fn delete_entry(&self, id: &str) -> Result<Option<i64>> {
        let writer = self.writer()?;
        remove_entry_row(&writer, id)
    }

    // ========================================================================
    // SCHEDULING STATE
    // ========================================================================

    /// Cached scheduling state of a problem
    pub fn get_scheduling_state(&self, problem_id: i64) -> Result<Option<SchedulingState>> {
        let reader = self.reader()?;
        query_state(&reader, problem_id)
    }

    /// Overwrite the cached scheduling state of a problem
    pub fn write_scheduling_state(&self, problem_id: i64, state: &SchedulingState) -> Result<()> {
        let writer = self.writer()?;
        store_state(&writer, problem_id, state)
    }

    /// Write a batch of states in one transaction
    pub fn apply_states(&self, states: &BTreeMap<i64, SchedulingState>) -> Result<usize> {
        let mut writer = self.writer()?;
        let tx = writer.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for (problem_id, state) in states {
            store_state(&tx, *problem_id, state)?;
        }
        tx.commit()?;
        Ok(states.len())
    }

    // ========================================================================
    // TRANSACTIONAL OPERATIONS
    // ========================================================================

    /// Store a new review and bring the problem's state up to date
    ///
    /// Takes the incremental path when the entry is strictly the newest for
    /// its problem, otherwise replays the whole history.
    pub fn record_entry(&self, entry: &Entry, now: i64) -> Result<SchedulingState> {
        let mut writer = self.writer()?;
        let tx = writer.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = query_state(&tx, entry.problem_id)?
            .ok_or_else(|| StorageError::NotFound(format!("problem {}", entry.problem_id)))?;

        store_entry(&tx, entry)?;

        let state = match current.advance(entry.confidence, entry.ts) {
            Some(next) => next,
            None => {
                tracing::debug!(
                    problem_id = entry.problem_id,
                    "Entry is not the latest, replaying history"
                );
                recompute(&query_entries(&tx, entry.problem_id)?, now)
            }
        };

        store_state(&tx, entry.problem_id, &state)?;
        tx.commit()?;

        tracing::debug!(
            problem_id = entry.problem_id,
            entry_id = %entry.id,
            interval = state.interval,
            "Recorded entry"
        );
        Ok(state)
    }

    /// Delete an entry and replay its problem's remaining history
    pub fn remove_entry(&self, id: &str, now: i64) -> Result<Option<EntryRemoval>> {
        let mut writer = self.writer()?;
        let tx = writer.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(entry) = query_entry(&tx, id)? else {
            return Ok(None);
        };
        remove_entry_row(&tx, id)?;

        let state = if problem_exists(&tx, entry.problem_id)? {
            let state = recompute(&query_entries(&tx, entry.problem_id)?, now);
            store_state(&tx, entry.problem_id, &state)?;
            Some(state)
        } else {
            None
        };
        tx.commit()?;

        tracing::debug!(problem_id = entry.problem_id, entry_id = id, "Removed entry");
        Ok(Some(EntryRemoval { entry, state }))
    }

    /// Replay one problem's history and persist the result
    pub fn recompute_problem(&self, problem_id: i64, now: i64) -> Result<SchedulingState> {
        let mut writer = self.writer()?;
        let tx = writer.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !problem_exists(&tx, problem_id)? {
            return Err(StorageError::NotFound(format!("problem {}", problem_id)));
        }
        let state = recompute(&query_entries(&tx, problem_id)?, now);
        store_state(&tx, problem_id, &state)?;
        tx.commit()?;

        Ok(state)
    }

    /// Replay every problem from the stored entries
    pub fn rebuild_all(&self, now: i64) -> Result<RebuildReport> {
        let mut writer = self.writer()?;
        let tx = writer.transaction_with_behavior(TransactionBehavior::Exclusive)?;

        let report = rebuild_in(&tx, now)?;
        tx.commit()?;

        tracing::info!(
            problems = report.problems,
            entries = report.entries,
            orphaned = report.orphaned.len(),
            "Rebuilt scheduling state"
        );
        Ok(report)
    }

    /// Replace the entry table with `entries` and rebuild every problem
    ///
    /// Used after merging histories: the merged set becomes the source of
    /// truth and no incremental state survives.
    pub fn replace_entries(&self, entries: &[Entry], now: i64) -> Result<RebuildReport> {
        let mut writer = self.writer()?;
        let tx = writer.transaction_with_behavior(TransactionBehavior::Exclusive)?;

        tx.execute("DELETE FROM entries", [])?;
        for entry in entries {
            store_entry(&tx, entry)?;
        }
        let report = rebuild_in(&tx, now)?;
        tx.commit()?;

        tracing::info!(
            problems = report.problems,
            entries = report.entries,
            orphaned = report.orphaned.len(),
            "Replaced entries and rebuilt scheduling state"
        );
        Ok(report)
    }

    // ========================================================================
    // APP STATE & MAINTENANCE
    // ========================================================================

    /// Read a persisted setting
    pub fn get_app_state(&self, key: &str) -> Result<Option<String>> {
        let reader = self.reader()?;
        Ok(reader
            .query_row(
                "SELECT value FROM app_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Persist a setting
    pub fn set_app_state(&self, key: &str, value: &str) -> Result<()> {
        let writer = self.writer()?;
        writer.execute(
            "INSERT INTO app_state (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Summary counts at `now`
    pub fn get_stats(&self, now: i64) -> Result<TrackerStats> {
        let reader = self.reader()?;

        let total_problems: i64 =
            reader.query_row("SELECT COUNT(*) FROM problems", [], |row| row.get(0))?;
        let active_problems: i64 = reader.query_row(
            "SELECT COUNT(*) FROM problems WHERE active = 1",
            [],
            |row| row.get(0),
        )?;
        let due_problems: i64 = reader.query_row(
            "SELECT COUNT(*) FROM problems WHERE active = 1 AND next_review_at <= ?1",
            params![now],
            |row| row.get(0),
        )?;
        let total_entries: i64 =
            reader.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        let orphaned_entries: i64 = reader.query_row(
            "SELECT COUNT(*) FROM entries
             WHERE problem_id NOT IN (SELECT id FROM problems)",
            [],
            |row| row.get(0),
        )?;
        let last_review_at: Option<i64> =
            reader.query_row("SELECT MAX(ts) FROM entries", [], |row| row.get(0))?;

        Ok(TrackerStats {
            total_problems,
            active_problems,
            due_problems,
            total_entries,
            orphaned_entries,
            last_review_at,
        })
    }

    /// Create a consistent backup using VACUUM INTO
    pub fn backup_to(&self, path: &Path) -> Result<()> {
        let path_str = path
            .to_str()
            .ok_or_else(|| StorageError::Init("Invalid backup path encoding".to_string()))?;

        let reader = self.reader()?;

        // VACUUM INTO doesn't support parameterized queries; escape single quotes
        reader.execute_batch(&format!("VACUUM INTO '{}'", path_str.replace('\'', "''")))?;
        Ok(())
    }
}

// ============================================================================
// ROW HELPERS
// ============================================================================

fn row_to_problem(row: &rusqlite::Row) -> rusqlite::Result<Problem> {
    let code: i64 = row.get("difficulty")?;
    let difficulty =
        Difficulty::from_code(code).ok_or(rusqlite::Error::IntegralValueOutOfRange(3, code))?;

    Ok(Problem {
        id: row.get("id")?,
        slug: row.get("slug")?,
        title: row.get("title")?,
        difficulty,
        active: row.get("active")?,
        state: SchedulingState {
            repetitions: row.get("n")?,
            easiness: row.get("ef")?,
            interval: row.get("i")?,
            last_review_at: row.get("last_review_at")?,
            next_review_at: row.get("next_review_at")?,
        },
    })
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<Entry> {
    let raw: i64 = row.get("confidence")?;
    let confidence = Confidence::new(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Integer, Box::new(e)))?;

    Ok(Entry {
        id: row.get("id")?,
        problem_id: row.get("problem_id")?,
        confidence,
        ts: row.get("ts")?,
    })
}

fn query_problem(conn: &Connection, id: i64) -> Result<Option<Problem>> {
    let mut stmt = conn.prepare(&format!("SELECT {PROBLEM_COLUMNS} FROM problems WHERE id = ?1"))?;
    Ok(stmt.query_row(params![id], row_to_problem).optional()?)
}

fn problem_exists(conn: &Connection, id: i64) -> Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM problems WHERE id = ?1", params![id], |_| Ok(()))
        .optional()?
        .is_some())
}

fn query_problem_ids(conn: &Connection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM problems ORDER BY id")?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

fn query_state(conn: &Connection, problem_id: i64) -> Result<Option<SchedulingState>> {
    Ok(query_problem(conn, problem_id)?.map(|problem| problem.state))
}

fn store_state(conn: &Connection, problem_id: i64, state: &SchedulingState) -> Result<()> {
    let rows = conn.execute(
        "UPDATE problems
         SET n = ?1, ef = ?2, i = ?3, last_review_at = ?4, next_review_at = ?5
         WHERE id = ?6",
        params![
            state.repetitions,
            state.easiness,
            state.interval,
            state.last_review_at,
            state.next_review_at,
            problem_id,
        ],
    )?;
    if rows == 0 {
        return Err(StorageError::NotFound(format!("problem {}", problem_id)));
    }
    Ok(())
}

fn query_entries(conn: &Connection, problem_id: i64) -> Result<Vec<Entry>> {
    let mut stmt = conn.prepare(
        "SELECT id, problem_id, confidence, ts FROM entries
         WHERE problem_id = ?1
         ORDER BY ts, id",
    )?;
    let entries = stmt
        .query_map(params![problem_id], row_to_entry)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

fn query_entry(conn: &Connection, id: &str) -> Result<Option<Entry>> {
    Ok(conn
        .query_row(
            "SELECT id, problem_id, confidence, ts FROM entries WHERE id = ?1",
            params![id],
            row_to_entry,
        )
        .optional()?)
}

fn store_entry(conn: &Connection, entry: &Entry) -> Result<()> {
    conn.execute(
        "INSERT INTO entries (id, problem_id, confidence, ts) VALUES (?1, ?2, ?3, ?4)",
        params![
            entry.id,
            entry.problem_id,
            u8::from(entry.confidence),
            entry.ts
        ],
    )?;
    Ok(())
}

fn remove_entry_row(conn: &Connection, id: &str) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "DELETE FROM entries WHERE id = ?1 RETURNING problem_id",
            params![id],
            |row| row.get(0),
        )
        .optional()?)
}

fn rebuild_in(conn: &Connection, now: i64) -> Result<RebuildReport> {
    let problem_ids = query_problem_ids(conn)?;

    let mut stmt = conn.prepare("SELECT id, problem_id, confidence, ts FROM entries")?;
    let entries = stmt
        .query_map([], row_to_entry)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    drop(stmt);

    let rebuild = rebuild_states(&entries, problem_ids, now);
    for (problem_id, state) in &rebuild.states {
        store_state(conn, *problem_id, state)?;
    }

    Ok(RebuildReport {
        problems: rebuild.states.len(),
        entries: entries.len(),
        orphaned: rebuild.orphaned,
    })
}
