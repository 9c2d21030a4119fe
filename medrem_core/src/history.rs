//! Queries over logged dose records.
//!
//! Everything here works on an in-memory slice; the caller supplies `now`
//! so results stay deterministic.

use crate::DoseRecord;
use chrono::{Days, NaiveDate, NaiveDateTime};
use uuid::Uuid;

/// Records with `start <= time < end`, newest first
pub fn records_between(
    records: &[DoseRecord],
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Vec<DoseRecord> {
    let mut found: Vec<_> = records
        .iter()
        .filter(|r| r.time >= start && r.time < end)
        .cloned()
        .collect();
    sort_newest_first(&mut found);
    found
}

/// Records whose dose time falls on `day`, newest first
pub fn records_on(records: &[DoseRecord], day: NaiveDate) -> Vec<DoseRecord> {
    let start = day.and_time(chrono::NaiveTime::MIN);
    let end = day
        .checked_add_days(Days::new(1))
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
        .unwrap_or(NaiveDateTime::MAX);
    records_between(records, start, end)
}

/// Records from the last `days` days up to and including `now`
pub fn recent_records(records: &[DoseRecord], now: NaiveDateTime, days: u32) -> Vec<DoseRecord> {
    let start = now
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDateTime::MIN);
    let mut found: Vec<_> = records
        .iter()
        .filter(|r| r.time >= start && r.time <= now)
        .cloned()
        .collect();
    sort_newest_first(&mut found);
    found
}

/// Doses taken on the same calendar day as `now`
pub fn taken_count_today(records: &[DoseRecord], now: NaiveDateTime) -> usize {
    records_on(records, now.date())
        .iter()
        .filter(|r| r.taken)
        .count()
}

/// Doses marked missed on the same calendar day as `now`
pub fn missed_count_today(records: &[DoseRecord], now: NaiveDateTime) -> usize {
    records_on(records, now.date())
        .iter()
        .filter(|r| !r.taken)
        .count()
}

/// Time of the most recent taken dose for a reminder
pub fn last_taken_time(records: &[DoseRecord], reminder_id: Uuid) -> Option<NaiveDateTime> {
    records
        .iter()
        .filter(|r| r.reminder_id == reminder_id && r.taken)
        .map(|r| r.time)
        .max()
}

pub fn sort_newest_first(records: &mut [DoseRecord]) {
    records.sort_by(|a, b| b.time.cmp(&a.time));
}
