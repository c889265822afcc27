//! Database Migrations
//!
//! Schema migration definitions for the storage layer.

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: problems with SM-2 state, entries",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Key-value app state and due-date index",
        up: MIGRATION_V2_UP,
    },
];

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version number
    pub version: u32,
    /// Description
    pub description: &'static str,
    /// SQL to apply
    pub up: &'static str,
}

/// V1: Initial schema
const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS problems (
    id INTEGER PRIMARY KEY,
    slug TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    difficulty INTEGER NOT NULL DEFAULT 0 CHECK (difficulty BETWEEN 0 AND 2),
    active INTEGER NOT NULL DEFAULT 0,

    -- SM-2 state, a cached projection of the problem's entries
    n INTEGER NOT NULL DEFAULT 0 CHECK (n >= 0),
    ef REAL NOT NULL DEFAULT 2.5 CHECK (ef >= 1.3),
    i INTEGER NOT NULL DEFAULT 0 CHECK (i >= 0),
    last_review_at INTEGER,
    next_review_at INTEGER NOT NULL
);

-- No foreign key on problem_id: entries for unknown problems are kept
CREATE TABLE IF NOT EXISTS entries (
    id TEXT PRIMARY KEY,
    problem_id INTEGER NOT NULL,
    confidence INTEGER NOT NULL CHECK (confidence BETWEEN 0 AND 5),
    ts INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_entries_problem ON entries(problem_id, ts, id);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

/// V2: App state and due lookups
const MIGRATION_V2_UP: &str = r#"
CREATE TABLE IF NOT EXISTS app_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_problems_due ON problems(active, next_review_at);

UPDATE schema_version SET version = 2, applied_at = datetime('now');
"#;

/// Get current schema version from database
pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Apply pending migrations
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                "Applying migration v{}: {}",
                migration.version,
                migration.description
            );
            conn.execute_batch(migration.up)?;
            applied += 1;
        }
    }

    Ok(applied)
}
