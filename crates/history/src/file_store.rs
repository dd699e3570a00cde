//! JSONL file-backed history store.
//!
//! All records are loaded into memory at startup; reads scan the in-memory
//! copy and writes append to both the file and memory under one lock.
//! A record enters memory only after its line was written, so a failed
//! batch leaves memory holding the same prefix the file holds.
//!
//! ## File format
//! ```text
//! {"user_id":"u1","item_name":"Blue in Green","domain":"music","timestamp":1718000000}
//! ```
//! Corrupt lines are skipped on load.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::HistoryStore;
use crate::error::{HistoryError, Result};
use crate::record::{Record, cutoff_for};

/// History store persisted as one JSON record per line.
#[derive(Debug)]
pub struct FileHistoryStore {
    path: PathBuf,
    records: RwLock<Vec<Record>>,
}

impl FileHistoryStore {
    /// Open (creating if needed) the history file and load every record.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| HistoryError::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|e| HistoryError::io(&path, e))?;

        let records = load_records(&path, file)?;
        info!("Loaded {} history records from {}", records.len(), path.display());

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop records older than `retain_days` from memory and rewrite the file.
    ///
    /// Returns how many records were removed.
    pub fn cleanup(&self, retain_days: u32) -> Result<usize> {
        let mut records = self.records.write().map_err(|_| HistoryError::LockPoisoned)?;
        let cutoff = cutoff_for(Utc::now().timestamp(), retain_days);

        let before = records.len();
        let kept: Vec<Record> = records
            .iter()
            .filter(|r| r.timestamp >= cutoff)
            .cloned()
            .collect();
        let removed = before - kept.len();

        // Write to a sibling file first so a failed write leaves the old file intact
        let tmp_path = self.path.with_extension("jsonl.tmp");
        {
            let file = File::create(&tmp_path).map_err(|e| HistoryError::io(&tmp_path, e))?;
            let mut writer = BufWriter::new(file);
            for record in &kept {
                write_record(&mut writer, record, &tmp_path)?;
            }
            writer.flush().map_err(|e| HistoryError::io(&tmp_path, e))?;
        }
        std::fs::rename(&tmp_path, &self.path).map_err(|e| HistoryError::io(&self.path, e))?;

        *records = kept;
        info!(
            "History cleanup removed {} records older than {} days, {} kept",
            removed,
            retain_days,
            records.len()
        );
        Ok(removed)
    }
}

impl HistoryStore for FileHistoryStore {
    fn recent(&self, user_id: &str, domain: &str, days: u32) -> Result<Vec<String>> {
        let records = self.records.read().map_err(|_| HistoryError::LockPoisoned)?;
        let cutoff = cutoff_for(Utc::now().timestamp(), days);
        let items: Vec<String> = records
            .iter()
            .filter(|r| r.matches(user_id, domain, cutoff))
            .map(|r| r.item_name.clone())
            .collect();
        debug!(
            "Found {} history items for user {} in {} (last {} days)",
            items.len(),
            user_id,
            domain,
            days
        );
        Ok(items)
    }

    fn record(&self, user_id: &str, domain: &str, items: &[String]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let mut records = self.records.write().map_err(|_| HistoryError::LockPoisoned)?;

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| HistoryError::io(&self.path, e))?;

        let now = Utc::now().timestamp();
        let new_records = items
            .iter()
            .map(|item| Record::new(user_id, item.as_str(), domain, now));
        append_records(&mut file, new_records, &mut records, &self.path)?;
        debug!("Recorded {} history items for user {} in {}", items.len(), user_id, domain);
        Ok(())
    }
}

fn load_records(path: &Path, file: File) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| HistoryError::io(path, e))?;
        match Record::parse_line(&line) {
            None => continue,
            Some(Ok(record)) => records.push(record),
            Some(Err(e)) => warn!("Skipping corrupt history line {} in {}: {}", index + 1, path.display(), e),
        }
    }
    Ok(records)
}

/// Write each record as one unbuffered line, pushing it to `written` once
/// the line is out.
fn append_records(
    writer: &mut impl Write,
    new_records: impl IntoIterator<Item = Record>,
    written: &mut Vec<Record>,
    path: &Path,
) -> Result<()> {
    for record in new_records {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        writer.write_all(&line).map_err(|e| HistoryError::io(path, e))?;
        written.push(record);
    }
    Ok(())
}

fn write_record(writer: &mut impl Write, record: &Record, path: &Path) -> Result<()> {
    serde_json::to_writer(&mut *writer, record)?;
    writer.write_all(b"\n").map_err(|e| HistoryError::io(path, e))
}
