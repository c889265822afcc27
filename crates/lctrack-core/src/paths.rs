//! Data directory layout
//!
//! Everything lives under one data directory, resolved in order from an
//! explicit path, the `LCTRACK_DATA_DIR` environment variable, and the
//! platform data directory.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::storage::{Result, StorageError};
use crate::sync::BACKUP_HISTORY_FILE;

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "LCTRACK_DATA_DIR";

/// Database file name
pub const DATABASE_FILE: &str = "lctrack.db";

/// Local event history file name
pub const LOCAL_HISTORY_FILE: &str = "event_history_local.jsonl";

/// Backup repository directory name
pub const BACKUP_DIR: &str = "backup";

/// Resolved file locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerPaths {
    data_dir: PathBuf,
}

impl TrackerPaths {
    /// Paths rooted at `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Resolve the data directory: `explicit`, then the environment, then the
    /// platform default
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        if let Some(dir) = explicit {
            return Ok(Self::new(dir));
        }

        if let Ok(dir) = std::env::var(DATA_DIR_ENV)
            && !dir.trim().is_empty()
        {
            return Ok(Self::new(dir));
        }

        let proj_dirs = ProjectDirs::from("com", "lctrack", "lctrack").ok_or_else(|| {
            StorageError::Init("Could not determine project directories".to_string())
        })?;
        Ok(Self::new(proj_dirs.data_dir()))
    }

    /// Create the data directory with owner-only permissions
    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        // Restrict directory permissions to owner-only on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            let _ = std::fs::set_permissions(&self.data_dir, perms);
        }
        Ok(())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn database(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub fn local_history(&self) -> PathBuf {
        self.data_dir.join(LOCAL_HISTORY_FILE)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join(BACKUP_DIR)
    }

    pub fn backup_history(&self) -> PathBuf {
        self.backup_dir().join(BACKUP_HISTORY_FILE)
    }
}
