//! Backup Repository
//!
//! A local git repository holding the shared copy of the event history.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use git2::{Commit, ErrorCode, Repository, Signature};
use serde::{Deserialize, Serialize};

use crate::events::EventLog;

use super::{Result, SyncError};

/// File name of the history inside the backup repository
pub const BACKUP_HISTORY_FILE: &str = "event_history_backup.jsonl";

/// Information about a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub id: String,
    pub short_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Git repository the merged event history is committed to
pub struct BackupRepo {
    dir: PathBuf,
    repo: Repository,
}

impl BackupRepo {
    /// Open the repository in `dir`, initializing it when missing
    pub fn open_or_init(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let repo = match Repository::open(&dir) {
            Ok(repo) => repo,
            Err(e) if e.code() == ErrorCode::NotFound => {
                let repo = Repository::init(&dir)?;
                tracing::info!("Initialized backup repository at {:?}", dir);
                repo
            }
            Err(e) => return Err(SyncError::Git(e)),
        };

        Ok(Self { dir, repo })
    }

    /// Repository working directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the backup history file
    pub fn history_path(&self) -> PathBuf {
        self.dir.join(BACKUP_HISTORY_FILE)
    }

    /// Event log backed by the history file
    pub fn event_log(&self) -> EventLog {
        EventLog::open(self.history_path())
    }

    /// Commit the history file if it differs from HEAD
    ///
    /// Returns `None` when there was nothing to commit.
    pub fn commit_history(&self, message: &str) -> Result<Option<CommitInfo>> {
        if !self.history_path().exists() {
            return Ok(None);
        }

        let mut index = self.repo.index()?;
        index.add_path(Path::new(BACKUP_HISTORY_FILE))?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;

        let parent_commit = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        if let Some(parent) = &parent_commit
            && parent.tree_id() == tree_id
        {
            tracing::debug!("Backup history unchanged, skipping commit");
            return Ok(None);
        }

        let sig = self.signature()?;
        let commit_id = match &parent_commit {
            Some(parent) => self.repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[parent])?,
            None => self.repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[])?,
        };

        let commit = self.repo.find_commit(commit_id)?;
        let info = commit_to_info(&commit);
        tracing::info!(commit = %info.short_id, "Committed backup history");
        Ok(Some(info))
    }

    /// The commit HEAD points at, if any
    pub fn last_commit(&self) -> Result<Option<CommitInfo>> {
        match self.repo.head() {
            Ok(head) => Ok(Some(commit_to_info(&head.peel_to_commit()?))),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
            Err(e) => Err(SyncError::Git(e)),
        }
    }

    /// Signature from git config, falling back to a fixed identity
    fn signature(&self) -> Result<Signature<'static>> {
        if let Ok(sig) = self.repo.signature() {
            return Ok(Signature::now(
                sig.name().unwrap_or("lctrack"),
                sig.email().unwrap_or("lctrack@localhost"),
            )?);
        }

        Ok(Signature::now("lctrack", "lctrack@localhost")?)
    }
}

fn commit_to_info(commit: &Commit) -> CommitInfo {
    let timestamp = DateTime::from_timestamp(commit.time().seconds(), 0).unwrap_or_else(Utc::now);
    let id = commit.id().to_string();

    CommitInfo {
        short_id: id.chars().take(7).collect(),
        id,
        message: commit.message().unwrap_or("").trim().to_string(),
        timestamp,
    }
}
