//! Core domain types for the medication reminder.
//!
//! This module defines the fundamental types used throughout the system:
//! - Medicines and the reminders that schedule them
//! - Recurrence rules and computed dose occurrences
//! - Dose records logged when a dose is taken or missed

use chrono::{DateTime, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Medicines
// ============================================================================

/// A medicine the user takes
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Medicine {
    pub id: Uuid,
    pub name: String,
    pub dosage: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub photo_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Medicine {
    pub fn new(name: impl Into<String>, dosage: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            dosage: dosage.into(),
            description: None,
            photo_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check that the required fields are filled in
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::Error::Validation("medicine name is empty".into()));
        }
        if self.dosage.trim().is_empty() {
            return Err(crate::Error::Validation(format!(
                "dosage for {} is empty",
                self.name
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Recurrence Rules
// ============================================================================

/// How a reminder recurs
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    /// One or more doses every day, `interval_hours` apart
    FixedTimesPerDay,
    /// One dose every `interval_days` days
    FixedIntervalDays,
}

impl FromStr for ScheduleKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "daily" | "fixed_times_per_day" => Ok(Self::FixedTimesPerDay),
            "interval" | "interval_days" | "fixed_interval_days" => Ok(Self::FixedIntervalDays),
            other => Err(crate::Error::Validation(format!(
                "unknown schedule kind: {other}"
            ))),
        }
    }
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixedTimesPerDay => write!(f, "daily"),
            Self::FixedIntervalDays => write!(f, "interval"),
        }
    }
}

/// Immutable description of how often and when doses occur.
///
/// Both parameter groups are always present; only the one selected by
/// `kind` is read by the calculator. The other keeps whatever value it was
/// given so switching `kind` back and forth loses nothing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub kind: ScheduleKind,
    /// Anchor instant; its time-of-day is reused for every occurrence
    pub reference_time: NaiveDateTime,
    #[serde(default = "default_times_per_day")]
    pub times_per_day: u32,
    #[serde(default)]
    pub interval_hours: u32,
    #[serde(default = "default_interval_days")]
    pub interval_days: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_times_per_day() -> u32 {
    1
}

fn default_interval_days() -> u32 {
    1
}

fn default_active() -> bool {
    true
}

impl RecurrenceRule {
    /// A rule with `times_per_day` doses every day, `interval_hours` apart
    pub fn times_per_day(reference_time: NaiveDateTime, times_per_day: u32, interval_hours: u32) -> Self {
        Self {
            kind: ScheduleKind::FixedTimesPerDay,
            reference_time,
            times_per_day,
            interval_hours,
            interval_days: default_interval_days(),
            active: true,
        }
    }

    /// A rule with one dose every `interval_days` days
    pub fn every_days(reference_time: NaiveDateTime, interval_days: u32) -> Self {
        Self {
            kind: ScheduleKind::FixedIntervalDays,
            reference_time,
            times_per_day: default_times_per_day(),
            interval_hours: 0,
            interval_days,
            active: true,
        }
    }

    /// Reference time-of-day with seconds and sub-seconds dropped
    pub fn time_of_day(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.reference_time.hour(), self.reference_time.minute(), 0)
            .unwrap_or(NaiveTime::MIN)
    }

    /// Construction-time check of the parameter group selected by `kind`.
    ///
    /// The calculator never calls this; it answers for any input.
    pub fn validate(&self) -> crate::Result<()> {
        match self.kind {
            ScheduleKind::FixedTimesPerDay => {
                if self.times_per_day == 0 {
                    return Err(crate::Error::Validation(
                        "times per day must be at least 1".into(),
                    ));
                }
                if self.times_per_day > 1 {
                    if self.interval_hours == 0 {
                        return Err(crate::Error::Validation(
                            "interval hours must be at least 1 when dosing more than once a day"
                                .into(),
                        ));
                    }
                    let span = u64::from(self.times_per_day - 1) * u64::from(self.interval_hours);
                    if span >= 24 {
                        return Err(crate::Error::Validation(format!(
                            "{} doses {} hours apart do not fit in one day",
                            self.times_per_day, self.interval_hours
                        )));
                    }
                }
            }
            ScheduleKind::FixedIntervalDays => {
                if self.interval_days == 0 {
                    return Err(crate::Error::Validation(
                        "interval days must be at least 1".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Short human-readable summary, e.g. "3x daily every 6h from 08:00"
    pub fn describe(&self) -> String {
        let at = self.time_of_day().format("%H:%M");
        match self.kind {
            ScheduleKind::FixedTimesPerDay if self.times_per_day > 1 => format!(
                "{}x daily every {}h from {}",
                self.times_per_day, self.interval_hours, at
            ),
            ScheduleKind::FixedTimesPerDay => format!("daily at {}", at),
            ScheduleKind::FixedIntervalDays if self.interval_days == 1 => {
                format!("every day at {}", at)
            }
            ScheduleKind::FixedIntervalDays => {
                format!("every {} days at {}", self.interval_days, at)
            }
        }
    }
}

// ============================================================================
// Reminders
// ============================================================================

/// A recurrence rule bound to the medicines it reminds about
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Reminder {
    pub id: Uuid,
    pub medicine_ids: Vec<Uuid>,
    pub rule: RecurrenceRule,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reminder {
    pub fn new(medicine_ids: Vec<Uuid>, rule: RecurrenceRule) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            medicine_ids,
            rule,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.rule.active
    }
}

// ============================================================================
// Occurrences and Records
// ============================================================================

/// A single computed instant when a dose is due
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DoseOccurrence {
    pub time: NaiveDateTime,
    pub reminder_id: Uuid,
}

/// Next dose of a reminder together with the medicines it covers
#[derive(Clone, Debug)]
pub struct NextDose {
    pub occurrence: DoseOccurrence,
    pub medicines: Vec<Medicine>,
}

/// A logged fact that a dose was or wasn't taken
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DoseRecord {
    pub id: Uuid,
    pub reminder_id: Uuid,
    #[serde(default)]
    pub medicine_ids: Vec<Uuid>,
    pub time: NaiveDateTime,
    pub taken: bool,
    pub created_at: DateTime<Utc>,
    /// Set when the record has been flipped once (undo)
    #[serde(default)]
    pub amended_at: Option<DateTime<Utc>>,
}

impl DoseRecord {
    pub fn new(reminder: &Reminder, time: NaiveDateTime, taken: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            reminder_id: reminder.id,
            medicine_ids: reminder.medicine_ids.clone(),
            time,
            taken,
            created_at: Utc::now(),
            amended_at: None,
        }
    }
}
