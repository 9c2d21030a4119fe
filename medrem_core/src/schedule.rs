//! Next-dose calculation.
//!
//! Two entry points:
//! - [`compute_next_dose`] derives the next dose from a base time (now, or
//!   the last time a dose was taken). Pure, infallible, never consults
//!   `active`.
//! - [`next_alert_after`] finds the first scheduled slot strictly after now,
//!   for arranging a notification.
//!
//! Time-of-day always comes from the rule's reference time; only the date
//! advances with the rule's cadence.

use crate::{DoseOccurrence, RecurrenceRule, Reminder, ScheduleKind};
use chrono::{Days, Duration, NaiveDate, NaiveDateTime};

/// Compute the next dose time for `rule` relative to `base`.
///
/// - Once a day (`times_per_day <= 1`): next calendar day at the reference
///   time-of-day.
/// - Several times a day: `base + interval_hours` if that is still on or
///   before the day's last dose, otherwise tomorrow's first dose.
/// - Every N days: `base`'s date plus N days at the reference time-of-day.
pub fn compute_next_dose(rule: &RecurrenceRule, base: NaiveDateTime) -> NaiveDateTime {
    match rule.kind {
        ScheduleKind::FixedTimesPerDay if rule.times_per_day <= 1 => {
            at_reference(rule, add_days(base.date(), 1))
        }
        ScheduleKind::FixedTimesPerDay => {
            let candidate = base
                .checked_add_signed(Duration::hours(i64::from(rule.interval_hours)))
                .unwrap_or(NaiveDateTime::MAX);

            let span_hours =
                (u64::from(rule.times_per_day - 1) * u64::from(rule.interval_hours)) % 24;
            let (last_time, _) = rule
                .time_of_day()
                .overflowing_add_signed(Duration::hours(span_hours as i64));
            let last_dose_of_day = base.date().and_time(last_time);

            if candidate <= last_dose_of_day {
                candidate
            } else {
                at_reference(rule, add_days(base.date(), 1))
            }
        }
        ScheduleKind::FixedIntervalDays => {
            at_reference(rule, add_days(base.date(), u64::from(rule.interval_days)))
        }
    }
}

/// Next dose of a reminder.
///
/// Projected from the last taken dose while that projection is still after
/// `now`; a stale projection falls back to projecting from `now`. Returns
/// `None` for inactive reminders.
pub fn next_dose(
    reminder: &Reminder,
    last_taken: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> Option<DoseOccurrence> {
    if !reminder.is_active() {
        return None;
    }

    let (base, time) = match last_taken {
        Some(taken) => {
            let projected = compute_next_dose(&reminder.rule, taken);
            if projected > now {
                (taken, projected)
            } else {
                (now, compute_next_dose(&reminder.rule, now))
            }
        }
        None => (now, compute_next_dose(&reminder.rule, now)),
    };
    tracing::debug!(
        "Next dose for reminder {} from {}: {}",
        reminder.id,
        base,
        time
    );

    Some(DoseOccurrence {
        time,
        reminder_id: reminder.id,
    })
}

/// First scheduled slot of `rule` strictly after `now`.
///
/// Returns `None` for inactive rules and for rules too malformed to ever
/// produce a later slot.
pub fn next_alert_after(rule: &RecurrenceRule, now: NaiveDateTime) -> Option<NaiveDateTime> {
    if !rule.active {
        return None;
    }

    let next = match rule.kind {
        ScheduleKind::FixedTimesPerDay => next_daily_slot(rule, now),
        ScheduleKind::FixedIntervalDays => next_interval_slot(rule, now),
    }?;

    (next > now).then_some(next)
}

fn next_daily_slot(rule: &RecurrenceRule, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let offsets = slot_offsets(rule);
    let today = now.date();

    // Late slots of yesterday may wrap past midnight into today
    [today.pred_opt(), Some(today), today.succ_opt()]
        .into_iter()
        .flatten()
        .flat_map(|day| {
            let first = at_reference(rule, day);
            offsets
                .iter()
                .filter_map(move |h| first.checked_add_signed(Duration::hours(*h)))
        })
        .filter(|slot| *slot > now)
        .min()
}

/// Hour offsets of each dose from the first dose of its day
fn slot_offsets(rule: &RecurrenceRule) -> Vec<i64> {
    if rule.times_per_day <= 1 || rule.interval_hours == 0 {
        return vec![0];
    }

    let step = i64::from(rule.interval_hours);
    (0..i64::from(rule.times_per_day))
        .map(|i| i * step)
        .take_while(|h| *h < 48)
        .collect()
}

fn next_interval_slot(rule: &RecurrenceRule, now: NaiveDateTime) -> Option<NaiveDateTime> {
    if rule.interval_days == 0 {
        return None;
    }

    let start = at_reference(rule, rule.reference_time.date());
    if start > now {
        return Some(start);
    }

    let interval = i64::from(rule.interval_days);
    let elapsed_days = (now.date() - start.date()).num_days();
    let periods = elapsed_days / interval;
    let mut candidate = at_reference(
        rule,
        add_days(start.date(), (periods * interval) as u64),
    );
    if candidate <= now {
        candidate = at_reference(rule, add_days(candidate.date(), interval as u64));
    }
    Some(candidate)
}

fn at_reference(rule: &RecurrenceRule, day: NaiveDate) -> NaiveDateTime {
    day.and_time(rule.time_of_day())
}

/// Calendar-day addition, saturating at the end of chrono's range
fn add_days(day: NaiveDate, days: u64) -> NaiveDate {
    day.checked_add_days(Days::new(days))
        .unwrap_or(NaiveDate::MAX)
}
