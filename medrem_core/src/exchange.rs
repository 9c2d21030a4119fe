//! JSON export and import of all user data.
//!
//! The export document carries a format version; import refuses anything
//! it doesn't recognise. Medicines go in before reminders, reminders before
//! records, so references resolve at every step.

use crate::lockfile::LockGuard;
use crate::{records, DoseRecord, Error, Medicine, Registry, Reminder, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current export format version
pub const EXPORT_VERSION: &str = "1.0";

/// Everything the user has entered, as one document
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExportData {
    pub version: String,
    #[serde(default)]
    pub medicines: Vec<Medicine>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    #[serde(default)]
    pub records: Vec<DoseRecord>,
}

/// What an import added or replaced
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub medicines: usize,
    pub reminders: usize,
    pub records: usize,
}

/// Snapshot the registry and record log
pub fn collect(registry_path: &Path, records_path: &Path) -> Result<ExportData> {
    let registry = Registry::load(registry_path)?;
    let records = records::read_records(records_path)?;

    Ok(ExportData {
        version: EXPORT_VERSION.into(),
        medicines: registry.medicines,
        reminders: registry.reminders,
        records,
    })
}

/// Write all data to `out` as pretty-printed JSON
pub fn export_to(registry_path: &Path, records_path: &Path, out: &Path) -> Result<ExportData> {
    let data = collect(registry_path, records_path)?;

    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&data)?;
    std::fs::write(out, json)?;

    tracing::info!(
        "Exported {} medicines, {} reminders, {} records to {:?}",
        data.medicines.len(),
        data.reminders.len(),
        data.records.len(),
        out
    );
    Ok(data)
}

/// Parse an export document, checking its version
pub fn parse(json: &str) -> Result<ExportData> {
    let data: ExportData = serde_json::from_str(json)?;
    if data.version != EXPORT_VERSION {
        return Err(Error::UnsupportedVersion(data.version));
    }
    Ok(data)
}

/// Import an export file.
///
/// With `overwrite`, existing medicines, reminders and records are cleared
/// first. Otherwise imported items are merged in, replacing any existing
/// item with the same id.
pub fn import_from(
    input: &Path,
    registry_path: &Path,
    records_path: &Path,
    overwrite: bool,
) -> Result<ImportSummary> {
    let contents = std::fs::read_to_string(input)?;
    let data = parse(&contents)?;
    apply(data, registry_path, records_path, overwrite)
}

/// Merge or overwrite stored data with an already-parsed document
pub fn apply(
    data: ExportData,
    registry_path: &Path,
    records_path: &Path,
    overwrite: bool,
) -> Result<ImportSummary> {
    let _registry_lock = LockGuard::acquire(registry_path)?;
    let mut registry = if overwrite {
        Registry::default()
    } else {
        Registry::load(registry_path)?
    };

    let summary = ImportSummary {
        medicines: data.medicines.len(),
        reminders: data.reminders.len(),
        records: data.records.len(),
    };

    for medicine in data.medicines {
        medicine.validate()?;
        upsert(&mut registry.medicines, medicine, |m| m.id);
    }
    for reminder in data.reminders {
        registry.check_reminder(&reminder).map_err(|e| {
            Error::Validation(format!("imported reminder {}: {}", reminder.id, e))
        })?;
        upsert(&mut registry.reminders, reminder, |r| r.id);
    }
    if let Some(orphan) = data
        .records
        .iter()
        .find(|r| registry.reminder(r.reminder_id).is_none())
    {
        return Err(Error::Validation(format!(
            "dose record {} refers to unknown reminder {}",
            orphan.id, orphan.reminder_id
        )));
    }

    // Validation above happens before anything is written
    registry.save(registry_path)?;
    records::update_records(records_path, |all| {
        if overwrite {
            all.clear();
        }
        for record in data.records {
            upsert(all, record, |r| r.id);
        }
        Ok(())
    })?;

    tracing::info!(
        "Imported {} medicines, {} reminders, {} records (overwrite: {})",
        summary.medicines,
        summary.reminders,
        summary.records,
        overwrite
    );
    Ok(summary)
}

fn upsert<T, K: PartialEq>(items: &mut Vec<T>, item: T, key: impl Fn(&T) -> K) {
    let k = key(&item);
    match items.iter_mut().find(|existing| key(existing) == k) {
        Some(slot) => *slot = item,
        None => items.push(item),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::RecordSink;
    use crate::RecurrenceRule;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    struct Paths {
        _dir: tempfile::TempDir,
        registry: PathBuf,
        records: PathBuf,
        export: PathBuf,
    }

    fn paths() -> Paths {
        let dir = tempfile::tempdir().unwrap();
        Paths {
            registry: dir.path().join("registry.json"),
            records: dir.path().join("doses.jsonl"),
            export: dir.path().join("out").join("export.json"),
            _dir: dir,
        }
    }

    fn seed(p: &Paths) -> (Medicine, Reminder, DoseRecord) {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let medicine = Medicine::new("Levothyroxine", "50mcg");
        let reminder = Reminder::new(vec![medicine.id], RecurrenceRule::every_days(start, 1));
        let record = DoseRecord::new(&reminder, start, true);

        let mut registry = Registry::default();
        registry.add_medicine(medicine.clone()).unwrap();
        registry.add_reminder(reminder.clone()).unwrap();
        registry.save(&p.registry).unwrap();
        records::JsonlRecordLog::new(&p.records).append(&record).unwrap();

        (medicine, reminder, record)
    }

    #[test]
    fn test_export_writes_versioned_document() {
        let p = paths();
        seed(&p);

        let data = export_to(&p.registry, &p.records, &p.export).unwrap();
        assert_eq!(data.version, "1.0");

        let json = std::fs::read_to_string(&p.export).unwrap();
        assert!(json.contains("\"version\": \"1.0\""));
        assert!(json.contains("Levothyroxine"));
    }

    #[test]
    fn test_import_into_empty_store() {
        let source = paths();
        let (medicine, reminder, record) = seed(&source);
        export_to(&source.registry, &source.records, &source.export).unwrap();

        let target = paths();
        let summary =
            import_from(&source.export, &target.registry, &target.records, false).unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                medicines: 1,
                reminders: 1,
                records: 1
            }
        );

        let registry = Registry::load(&target.registry).unwrap();
        assert_eq!(registry.medicines, vec![medicine]);
        assert_eq!(registry.reminders, vec![reminder]);
        assert_eq!(records::read_records(&target.records).unwrap(), vec![record]);
    }

    #[test]
    fn test_merge_replaces_same_ids() {
        let p = paths();
        seed(&p);
        export_to(&p.registry, &p.records, &p.export).unwrap();

        // Importing the same data twice does not duplicate anything
        import_from(&p.export, &p.registry, &p.records, false).unwrap();

        let registry = Registry::load(&p.registry).unwrap();
        assert_eq!(registry.medicines.len(), 1);
        assert_eq!(registry.reminders.len(), 1);
        assert_eq!(records::read_records(&p.records).unwrap().len(), 1);
    }

    #[test]
    fn test_overwrite_clears_existing() {
        let p = paths();
        seed(&p);

        let data = ExportData {
            version: EXPORT_VERSION.into(),
            medicines: vec![Medicine::new("Zinc", "15mg")],
            reminders: vec![],
            records: vec![],
        };
        apply(data, &p.registry, &p.records, true).unwrap();

        let registry = Registry::load(&p.registry).unwrap();
        assert_eq!(registry.medicines.len(), 1);
        assert_eq!(registry.medicines[0].name, "Zinc");
        assert!(registry.reminders.is_empty());
        assert!(records::read_records(&p.records).unwrap().is_empty());
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let json = r#"{"version":"2.0","medicines":[],"reminders":[],"records":[]}"#;
        match parse(json) {
            Err(Error::UnsupportedVersion(v)) => assert_eq!(v, "2.0"),
            other => panic!("expected version error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let json = r#"{"version":"1.0","exported_by":"phone","medicines":[]}"#;
        let data = parse(json).unwrap();
        assert!(data.medicines.is_empty());
        assert!(data.records.is_empty());
    }

    #[test]
    fn test_dangling_reminder_rejected_before_writing() {
        let p = paths();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let data = ExportData {
            version: EXPORT_VERSION.into(),
            medicines: vec![],
            reminders: vec![Reminder::new(
                vec![uuid::Uuid::new_v4()],
                RecurrenceRule::every_days(start, 1),
            )],
            records: vec![],
        };

        assert!(apply(data, &p.registry, &p.records, false).is_err());
        assert!(!p.registry.exists());
    }

    fn import_one_reminder(p: &Paths, rule: RecurrenceRule) -> Result<ImportSummary> {
        let medicine = Medicine::new("Amoxicillin", "250mg");
        let reminder = Reminder::new(vec![medicine.id], rule);
        let data = ExportData {
            version: EXPORT_VERSION.into(),
            medicines: vec![medicine],
            reminders: vec![reminder],
            records: vec![],
        };
        apply(data, &p.registry, &p.records, false)
    }

    #[test]
    fn test_invalid_rule_rejected_before_writing() {
        let p = paths();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();

        let zero_gap = RecurrenceRule::times_per_day(start, 3, 0);
        assert!(matches!(
            import_one_reminder(&p, zero_gap),
            Err(Error::Validation(_))
        ));

        let mut no_days = RecurrenceRule::every_days(start, 1);
        no_days.interval_days = 0;
        assert!(import_one_reminder(&p, no_days).is_err());

        assert!(!p.registry.exists());
        assert!(!p.records.exists());
    }

    #[test]
    fn test_orphan_record_rejected_before_writing() {
        let p = paths();
        let (_, reminder, _) = seed(&p);
        let before = std::fs::read_to_string(&p.records).unwrap();

        let stranger = Reminder::new(vec![uuid::Uuid::new_v4()], reminder.rule.clone());
        let data = ExportData {
            version: EXPORT_VERSION.into(),
            medicines: vec![],
            reminders: vec![],
            records: vec![DoseRecord::new(&stranger, reminder.rule.reference_time, true)],
        };

        assert!(matches!(
            apply(data, &p.registry, &p.records, false),
            Err(Error::Validation(_))
        ));
        assert_eq!(std::fs::read_to_string(&p.records).unwrap(), before);
    }

    #[test]
    fn test_records_for_existing_reminder_merge_in() {
        let p = paths();
        let (_, reminder, record) = seed(&p);

        let later = reminder.rule.reference_time + chrono::Duration::days(1);
        let data = ExportData {
            version: EXPORT_VERSION.into(),
            medicines: vec![],
            reminders: vec![],
            records: vec![DoseRecord::new(&reminder, later, false)],
        };
        apply(data, &p.registry, &p.records, false).unwrap();

        let stored = records::read_records(&p.records).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0], record);
    }
}
