//! Upcoming-dose planning for the dashboard.
//!
//! For each active reminder:
//! - The next dose is projected from the last taken dose of that reminder
//! - If that projection isn't after `now` (or nothing was taken), it is
//!   projected from `now` instead
//! - Medicines are resolved from the registry

use crate::{history, schedule, DoseRecord, NextDose, Registry};
use chrono::NaiveDateTime;

/// Next dose of every active reminder, soonest first
pub fn upcoming_doses(
    registry: &Registry,
    records: &[DoseRecord],
    now: NaiveDateTime,
) -> Vec<NextDose> {
    let mut upcoming: Vec<NextDose> = registry
        .active_reminders()
        .filter_map(|reminder| {
            let last_taken = history::last_taken_time(records, reminder.id);
            let occurrence = schedule::next_dose(reminder, last_taken, now)?;
            Some(NextDose {
                medicines: registry.medicines_by_ids(&reminder.medicine_ids),
                occurrence,
            })
        })
        .collect();

    upcoming.sort_by(|a, b| a.occurrence.time.cmp(&b.occurrence.time));

    tracing::info!("Planned {} upcoming doses", upcoming.len());
    upcoming
}

/// The single soonest dose across all active reminders
pub fn soonest_dose(
    registry: &Registry,
    records: &[DoseRecord],
    now: NaiveDateTime,
) -> Option<NextDose> {
    upcoming_doses(registry, records, now).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Medicine, RecurrenceRule, Reminder};
    use chrono::NaiveDate;

    fn dt(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn fixture() -> (Registry, Reminder, Reminder) {
        let mut registry = Registry::default();
        let a = registry.add_medicine(Medicine::new("Vitamin D", "1000 IU")).unwrap();
        let b = registry.add_medicine(Medicine::new("Amoxicillin", "250mg")).unwrap();

        let weekly = Reminder::new(vec![a], RecurrenceRule::every_days(dt(1, 9, 0), 7));
        let thrice = Reminder::new(vec![b, a], RecurrenceRule::times_per_day(dt(1, 8, 0), 3, 6));
        registry.add_reminder(weekly.clone()).unwrap();
        registry.add_reminder(thrice.clone()).unwrap();
        (registry, weekly, thrice)
    }

    #[test]
    fn test_upcoming_sorted_and_resolved() {
        let (registry, weekly, thrice) = fixture();
        let now = dt(3, 10, 0);

        let upcoming = upcoming_doses(&registry, &[], now);
        assert_eq!(upcoming.len(), 2);

        assert_eq!(upcoming[0].occurrence.reminder_id, thrice.id);
        assert_eq!(upcoming[0].occurrence.time, dt(3, 16, 0));
        let names: Vec<_> = upcoming[0].medicines.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Amoxicillin", "Vitamin D"]);

        assert_eq!(upcoming[1].occurrence.reminder_id, weekly.id);
        assert_eq!(upcoming[1].occurrence.time, dt(10, 9, 0));
    }

    #[test]
    fn test_last_taken_drives_base_time() {
        let (registry, _, thrice) = fixture();
        let records = vec![DoseRecord::new(&thrice, dt(3, 8, 10), true)];

        let next = soonest_dose(&registry, &records, dt(3, 10, 0)).unwrap();
        assert_eq!(next.occurrence.reminder_id, thrice.id);
        assert_eq!(next.occurrence.time, dt(3, 14, 10));
    }

    #[test]
    fn test_stale_last_taken_projects_from_now() {
        let (registry, weekly, thrice) = fixture();
        let records = vec![
            DoseRecord::new(&weekly, dt(1, 9, 0), true),
            DoseRecord::new(&thrice, dt(1, 8, 0), true),
        ];
        let now = dt(30, 12, 0);

        let upcoming = upcoming_doses(&registry, &records, now);
        assert_eq!(upcoming.len(), 2);
        assert!(upcoming.iter().all(|d| d.occurrence.time > now));

        assert_eq!(upcoming[0].occurrence.reminder_id, thrice.id);
        assert_eq!(upcoming[0].occurrence.time, dt(30, 18, 0));
        assert_eq!(upcoming[1].occurrence.reminder_id, weekly.id);
        assert_eq!(
            upcoming[1].occurrence.time,
            NaiveDate::from_ymd_opt(2024, 8, 6)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_missed_records_do_not_move_base() {
        let (registry, _, thrice) = fixture();
        let records = vec![DoseRecord::new(&thrice, dt(3, 8, 10), false)];

        let next = soonest_dose(&registry, &records, dt(3, 10, 0)).unwrap();
        assert_eq!(next.occurrence.time, dt(3, 16, 0));
    }

    #[test]
    fn test_paused_reminders_excluded() {
        let (mut registry, weekly, thrice) = fixture();
        registry.set_reminder_active(thrice.id, false).unwrap();

        let upcoming = upcoming_doses(&registry, &[], dt(3, 10, 0));
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].occurrence.reminder_id, weekly.id);
    }

    #[test]
    fn test_empty_registry() {
        assert!(soonest_dose(&Registry::default(), &[], dt(3, 10, 0)).is_none());
    }
}
