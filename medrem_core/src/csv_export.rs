//! CSV export of dose history.

use crate::{DoseRecord, Result};
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    reminder_id: String,
    medicine_ids: String,
    time: String,
    taken: bool,
    created_at: String,
}

impl From<&DoseRecord> for CsvRow {
    fn from(record: &DoseRecord) -> Self {
        CsvRow {
            id: record.id.to_string(),
            reminder_id: record.reminder_id.to_string(),
            medicine_ids: record
                .medicine_ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(";"),
            time: record.time.format("%Y-%m-%dT%H:%M:%S").to_string(),
            taken: record.taken,
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

/// Write records to a new CSV file with a header row, fsynced
pub fn write_csv(path: &Path, records: &[DoseRecord]) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    for record in records {
        writer.serialize(CsvRow::from(record))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Wrote {} dose records to {:?}", records.len(), path);
    Ok(records.len())
}
