//! JSONL event log file and history merging

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::model::Entry;

use super::{Event, EventLogError, Result};

/// An append-only JSONL file of events
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    /// Event log at `path`; the file is created on first write
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every event, in file order. A missing file is an empty history.
    pub fn load(&self) -> Result<Vec<Event>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(fs::File::open(&self.path)?);
        let mut events = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let event = serde_json::from_str(line).map_err(|source| EventLogError::Parse {
                path: self.path.display().to_string(),
                line: index + 1,
                source,
            })?;
            events.push(event);
        }

        tracing::debug!(path = %self.path.display(), count = events.len(), "Loaded event log");
        Ok(events)
    }

    /// Append one event
    pub fn append(&self, event: &Event) -> Result<()> {
        self.ensure_parent()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Replace the whole log with `events`
    ///
    /// Writes to a sibling temp file first and renames it over the log.
    pub fn write_all(&self, events: &[Event]) -> Result<()> {
        self.ensure_parent()?;
        let tmp_path = self.path.with_extension("jsonl.tmp");
        {
            let mut writer = BufWriter::new(fs::File::create(&tmp_path)?);
            for event in events {
                serde_json::to_writer(&mut writer, event)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

/// Union of two histories, deduplicated by event id, sorted by `(ts, id)`
pub fn merge_histories(left: Vec<Event>, right: Vec<Event>) -> Vec<Event> {
    let mut by_id: BTreeMap<String, Event> = BTreeMap::new();
    for event in left.into_iter().chain(right) {
        by_id.entry(event.id().to_string()).or_insert(event);
    }

    let mut merged: Vec<Event> = by_id.into_values().collect();
    merged.sort_by(|a, b| (a.ts(), a.id()).cmp(&(b.ts(), b.id())));
    merged
}

/// The entry set a history describes
///
/// Entries are immutable and their ids unique, so a removal is final no matter
/// where it sits relative to the add: the result depends only on the set of
/// events, not their order. Output is in replay order.
pub fn materialize(events: &[Event]) -> Vec<Entry> {
    let mut added: BTreeMap<&str, Entry> = BTreeMap::new();
    let mut removed: BTreeSet<&str> = BTreeSet::new();

    for event in events {
        match event {
            Event::AddEntry {
                ts,
                entry_id,
                problem_id,
                confidence,
                ..
            } => {
                added
                    .entry(entry_id.as_str())
                    .or_insert_with(|| Entry::with_id(entry_id.clone(), *problem_id, *confidence, *ts));
            }
            Event::RmEntry { target_entry_id, .. } => {
                removed.insert(target_entry_id.as_str());
            }
        }
    }

    let dangling = removed.iter().filter(|id| !added.contains_key(*id)).count();
    if dangling > 0 {
        tracing::warn!(count = dangling, "Ignoring removals of entries never added");
    }

    let mut result: Vec<Entry> = added
        .into_iter()
        .filter(|(id, _)| !removed.contains(id))
        .map(|(_, entry)| entry)
        .collect();
    tracing::debug!(entries = result.len(), "Materialized history");

    crate::sm2::sort_entries(&mut result);
    result
}
