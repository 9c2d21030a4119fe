//! Dose record log.
//!
//! Records are appended to a JSONL (JSON Lines) file. Undo and deletions
//! rewrite the whole file atomically. Appends and rewrites both hold the
//! log's sidecar lock, so a rewrite never drops a concurrent append.

use crate::lockfile::LockGuard;
use crate::{DoseRecord, Error, Result};
use chrono::{NaiveDateTime, Utc};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Record sink trait for persisting dose records
pub trait RecordSink {
    fn append(&mut self, record: &DoseRecord) -> Result<()>;
}

/// JSONL-based record sink with file locking
pub struct JsonlRecordLog {
    path: PathBuf,
}

impl JsonlRecordLog {
    /// Create a new record log for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl RecordSink for JsonlRecordLog {
    fn append(&mut self, record: &DoseRecord) -> Result<()> {
        self.ensure_parent_dir()?;
        let _guard = LockGuard::acquire(&self.path)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(record)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);

        file.unlock()?;

        tracing::debug!("Appended dose record {} to {:?}", record.id, self.path);
        Ok(())
    }
}

/// Read all records from a log file
///
/// Malformed lines are skipped with a warning.
pub fn read_records(path: &Path) -> Result<Vec<DoseRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<DoseRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Failed to parse dose record at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} dose records from {:?}", records.len(), path);
    Ok(records)
}

/// Replace the log contents with `records`, atomically
pub fn write_records(path: &Path, records: &[DoseRecord]) -> Result<()> {
    let _guard = LockGuard::acquire(path)?;
    persist_records(path, records)
}

/// Temp file + fsync + rename. Caller holds the sidecar lock.
fn persist_records(path: &Path, records: &[DoseRecord]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::State(format!("record log {:?} has no parent directory", path)))?;
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    temp.as_file().lock_exclusive()?;

    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        for record in records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.as_file().unlock()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::debug!("Rewrote {:?} with {} records", path, records.len());
    Ok(())
}

/// Read, modify and rewrite the log under its lock.
///
/// Nothing is written if `f` fails.
pub fn update_records<F, T>(path: &Path, f: F) -> Result<T>
where
    F: FnOnce(&mut Vec<DoseRecord>) -> Result<T>,
{
    let _guard = LockGuard::acquire(path)?;
    let mut records = read_records(path)?;
    let out = f(&mut records)?;
    persist_records(path, &records)?;
    Ok(out)
}

/// Set a record's `taken` flag. A record may only be amended once.
pub fn set_taken(path: &Path, id: Uuid, taken: bool) -> Result<DoseRecord> {
    update_records(path, |records| amend(records, id, |_| taken))
}

/// Invert a record's `taken` flag (undo)
pub fn toggle_taken(path: &Path, id: Uuid) -> Result<DoseRecord> {
    update_records(path, |records| amend(records, id, |current| !current))
}

fn amend(
    records: &mut [DoseRecord],
    id: Uuid,
    taken: impl FnOnce(bool) -> bool,
) -> Result<DoseRecord> {
    let record = records
        .iter_mut()
        .find(|r| r.id == id)
        .ok_or_else(|| Error::NotFound(format!("dose record {}", id)))?;

    if record.amended_at.is_some() {
        return Err(Error::Validation(format!(
            "dose record {} was already amended",
            id
        )));
    }

    record.taken = taken(record.taken);
    record.amended_at = Some(Utc::now());
    tracing::info!("Marked dose record {} as taken={}", id, record.taken);
    Ok(record.clone())
}

/// Remove a single record
pub fn delete_record(path: &Path, id: Uuid) -> Result<DoseRecord> {
    update_records(path, |records| {
        let idx = records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| Error::NotFound(format!("dose record {}", id)))?;
        let removed = records.remove(idx);
        tracing::info!("Deleted dose record {}", id);
        Ok(removed)
    })
}

/// Remove every record whose dose time is before `cutoff`
pub fn delete_before(path: &Path, cutoff: NaiveDateTime) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }

    let removed = update_records(path, |records| {
        let before = records.len();
        records.retain(|r| r.time >= cutoff);
        Ok(before - records.len())
    })?;

    if removed > 0 {
        tracing::info!("Purged {} dose records older than {}", removed, cutoff);
    }
    Ok(removed)
}

/// Remove every record
pub fn clear(path: &Path) -> Result<()> {
    if path.exists() {
        write_records(path, &[])?;
        tracing::info!("Cleared dose records in {:?}", path);
    }
    Ok(())
}

/// Resolve a full record id or a unique prefix of one
pub fn find_record<'a>(records: &'a [DoseRecord], id_or_prefix: &str) -> Result<&'a DoseRecord> {
    crate::registry::resolve_prefix(records, id_or_prefix, |r| r.id, "dose record")
}
