#![forbid(unsafe_code)]

//! Core domain model and business logic for the medrem medication reminder.
//!
//! This crate provides:
//! - Domain types (medicines, reminders, recurrence rules, dose records)
//! - Next-dose calculation
//! - Persistence (registry document, dose record log)
//! - History queries and dashboard planning
//! - JSON export/import and CSV history export

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod lockfile;
pub mod schedule;
pub mod registry;
pub mod records;
pub mod history;
pub mod planner;
pub mod exchange;
pub mod csv_export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use registry::Registry;
pub use records::{JsonlRecordLog, RecordSink};
pub use schedule::{compute_next_dose, next_alert_after, next_dose};
pub use planner::upcoming_doses;
pub use exchange::{ExportData, ImportSummary, EXPORT_VERSION};
