//! Medicine and reminder persistence with file locking.
//!
//! The registry is a single JSON document. Loads take a shared lock; saves
//! write a temp file under an exclusive lock, fsync it and rename it over
//! the existing file. `update` holds the sidecar lock across the whole
//! load-modify-save cycle.

use crate::lockfile::LockGuard;
use crate::{Error, Medicine, Reminder, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use uuid::Uuid;

/// All medicines and reminders known to the user
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct Registry {
    #[serde(default)]
    pub medicines: Vec<Medicine>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
}

impl Registry {
    /// Load the registry from a file with shared locking
    ///
    /// Returns an empty registry if the file doesn't exist. A file that
    /// exists but can't be parsed is an error: saving over it would drop
    /// every medicine and reminder.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No registry file found at {:?}, starting empty", path);
            return Ok(Self::default());
        }

        let file = File::open(path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        let registry = serde_json::from_str::<Registry>(&contents).map_err(|e| {
            Error::State(format!("registry file {:?} is corrupted: {}", path, e))
        })?;

        tracing::debug!(
            "Loaded {} medicines and {} reminders from {:?}",
            registry.medicines.len(),
            registry.reminders.len(),
            path
        );
        Ok(registry)
    }

    /// Save the registry atomically with exclusive locking
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path.parent().ok_or_else(|| {
            Error::State(format!("registry path {:?} has no parent directory", path))
        })?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved registry to {:?}", path);
        Ok(())
    }

    /// Load the registry, modify it, and save it back
    pub fn update<F, T>(path: &Path, f: F) -> Result<T>
    where
        F: FnOnce(&mut Registry) -> Result<T>,
    {
        let _guard = LockGuard::acquire(path)?;
        let mut registry = Self::load(path)?;
        let out = f(&mut registry)?;
        registry.save(path)?;
        Ok(out)
    }

    // ------------------------------------------------------------------------
    // Medicines
    // ------------------------------------------------------------------------

    pub fn add_medicine(&mut self, medicine: Medicine) -> Result<Uuid> {
        medicine.validate()?;
        let id = medicine.id;
        tracing::info!("Adding medicine {} ({})", medicine.name, id);
        self.medicines.push(medicine);
        Ok(id)
    }

    /// Replace a medicine with the same id, bumping `updated_at`
    pub fn update_medicine(&mut self, mut medicine: Medicine) -> Result<()> {
        medicine.validate()?;
        let slot = self
            .medicines
            .iter_mut()
            .find(|m| m.id == medicine.id)
            .ok_or_else(|| Error::NotFound(format!("medicine {}", medicine.id)))?;
        medicine.updated_at = chrono::Utc::now();
        *slot = medicine;
        Ok(())
    }

    /// Remove a medicine no reminder refers to
    pub fn remove_medicine(&mut self, id: Uuid) -> Result<Medicine> {
        let users = self.reminders_for_medicine(id).count();
        if users > 0 {
            return Err(Error::Validation(format!(
                "medicine {} is used by {} reminder(s)",
                id, users
            )));
        }

        let idx = self
            .medicines
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| Error::NotFound(format!("medicine {}", id)))?;
        let removed = self.medicines.remove(idx);
        tracing::info!("Removed medicine {} ({})", removed.name, id);
        Ok(removed)
    }

    pub fn medicine(&self, id: Uuid) -> Option<&Medicine> {
        self.medicines.iter().find(|m| m.id == id)
    }

    /// Medicines for the given ids, in id order; unknown ids are skipped
    pub fn medicines_by_ids(&self, ids: &[Uuid]) -> Vec<Medicine> {
        ids.iter().filter_map(|id| self.medicine(*id)).cloned().collect()
    }

    /// Resolve a full id or a unique prefix of one
    pub fn find_medicine(&self, id_or_prefix: &str) -> Result<&Medicine> {
        resolve_prefix(&self.medicines, id_or_prefix, |m| m.id, "medicine")
    }

    // ------------------------------------------------------------------------
    // Reminders
    // ------------------------------------------------------------------------

    pub fn add_reminder(&mut self, reminder: Reminder) -> Result<Uuid> {
        self.check_reminder(&reminder)?;
        let id = reminder.id;
        tracing::info!("Adding reminder {} ({})", id, reminder.rule.describe());
        self.reminders.push(reminder);
        Ok(id)
    }

    /// Replace a reminder with the same id, bumping `updated_at`
    pub fn update_reminder(&mut self, mut reminder: Reminder) -> Result<()> {
        self.check_reminder(&reminder)?;
        let slot = self
            .reminders
            .iter_mut()
            .find(|r| r.id == reminder.id)
            .ok_or_else(|| Error::NotFound(format!("reminder {}", reminder.id)))?;
        reminder.updated_at = chrono::Utc::now();
        *slot = reminder;
        Ok(())
    }

    pub fn remove_reminder(&mut self, id: Uuid) -> Result<Reminder> {
        let idx = self
            .reminders
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| Error::NotFound(format!("reminder {}", id)))?;
        let removed = self.reminders.remove(idx);
        tracing::info!("Removed reminder {}", id);
        Ok(removed)
    }

    /// Pause or resume a reminder
    pub fn set_reminder_active(&mut self, id: Uuid, active: bool) -> Result<()> {
        let reminder = self
            .reminders
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::NotFound(format!("reminder {}", id)))?;
        reminder.rule.active = active;
        reminder.updated_at = chrono::Utc::now();
        tracing::info!(
            "Reminder {} {}",
            id,
            if active { "resumed" } else { "paused" }
        );
        Ok(())
    }

    pub fn reminder(&self, id: Uuid) -> Option<&Reminder> {
        self.reminders.iter().find(|r| r.id == id)
    }

    pub fn find_reminder(&self, id_or_prefix: &str) -> Result<&Reminder> {
        resolve_prefix(&self.reminders, id_or_prefix, |r| r.id, "reminder")
    }

    pub fn active_reminders(&self) -> impl Iterator<Item = &Reminder> {
        self.reminders.iter().filter(|r| r.is_active())
    }

    pub fn reminders_for_medicine(&self, medicine_id: Uuid) -> impl Iterator<Item = &Reminder> {
        self.reminders
            .iter()
            .filter(move |r| r.medicine_ids.contains(&medicine_id))
    }

    pub(crate) fn check_reminder(&self, reminder: &Reminder) -> Result<()> {
        if reminder.medicine_ids.is_empty() {
            return Err(Error::Validation("reminder has no medicines".into()));
        }
        if let Some(missing) = reminder
            .medicine_ids
            .iter()
            .find(|id| self.medicine(**id).is_none())
        {
            return Err(Error::NotFound(format!("medicine {}", missing)));
        }
        reminder.rule.validate()
    }
}

/// Find the single item whose id equals or starts with `needle`
pub(crate) fn resolve_prefix<'a, T>(
    items: &'a [T],
    needle: &str,
    id: impl Fn(&T) -> Uuid,
    what: &str,
) -> Result<&'a T> {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return Err(Error::NotFound(format!("empty {} id", what)));
    }

    let mut matches = items
        .iter()
        .filter(|item| id(item).to_string().starts_with(&needle));

    match (matches.next(), matches.next()) {
        (Some(item), None) => Ok(item),
        (None, _) => Err(Error::NotFound(format!("{} {}", what, needle))),
        (Some(_), Some(_)) => Err(Error::Validation(format!(
            "{} id prefix {} is ambiguous",
            what, needle
        ))),
    }
}
