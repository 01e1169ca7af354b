//! Free-slot generator.
//!
//! # Responsibility
//! - Enumerate candidate starts on the granularity grid inside working hours.
//! - Drop candidates that overlap an active appointment.
//!
//! # Invariants
//! - Output is strictly ascending by start and free of duplicates.
//! - Every slot fits fully inside the weekday's working window.
//! - Overlap uses half-open intervals, so back-to-back slots are free.

use crate::model::appointment::Appointment;
use crate::model::policy::CalendarPolicy;
use crate::model::slot::Slot;
use chrono::{Datelike, NaiveDate, NaiveDateTime};

/// Returns free slots on `date`.
///
/// `existing` is expected to hold the appointments starting on `date`;
/// cancelled entries are ignored. Closed weekdays and empty windows yield an
/// empty list.
pub fn generate_slots(date: NaiveDate, policy: &CalendarPolicy, existing: &[Appointment]) -> Vec<Slot> {
    let Some(hours) = policy.hours_for(date.weekday()) else {
        return Vec::new();
    };

    let (open, close) = hours.window_on(date);
    let duration = policy.duration();
    let step = policy.granularity();
    let busy: Vec<(NaiveDateTime, NaiveDateTime)> = existing
        .iter()
        .filter(|appointment| appointment.is_active())
        .map(|appointment| (appointment.start, appointment.end()))
        .collect();

    let mut slots = Vec::new();
    let mut start = open;
    while start + duration <= close {
        let end = start + duration;
        let taken = busy
            .iter()
            .any(|(busy_start, busy_end)| start < *busy_end && end > *busy_start);
        if !taken {
            slots.push(Slot::new(start, policy.slot_duration()));
        }
        start += step;
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::generate_slots;
    use crate::model::appointment::{Appointment, AppointmentStatus};
    use crate::model::policy::{CalendarPolicy, WorkingHours};
    use chrono::{NaiveDate, NaiveTime, Weekday};

    fn thursday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 10).unwrap()
    }

    fn time(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn starts(slots: &[crate::model::slot::Slot]) -> Vec<NaiveTime> {
        slots.iter().map(|slot| slot.start.time()).collect()
    }

    #[test]
    fn skips_booked_hour_in_business_week() {
        let policy = CalendarPolicy::business_week();
        let booked = Appointment::new("Bob", None, thursday().and_time(time(10, 0)), 60);

        let slots = generate_slots(thursday(), &policy, &[booked]);
        assert_eq!(
            starts(&slots),
            vec![
                time(9, 0),
                time(11, 0),
                time(12, 0),
                time(13, 0),
                time(14, 0),
                time(15, 0),
                time(16, 0)
            ]
        );
        assert!(slots.iter().all(|slot| slot.duration_minutes == 60));
    }

    #[test]
    fn closed_weekday_yields_nothing() {
        let saturday = NaiveDate::from_ymd_opt(2025, 7, 12).unwrap();
        assert!(generate_slots(saturday, &CalendarPolicy::business_week(), &[]).is_empty());
    }

    #[test]
    fn empty_or_short_window_yields_nothing() {
        let empty = WorkingHours::new(time(9, 0), time(9, 0));
        let short = WorkingHours::new(time(9, 0), time(9, 45));
        let policy =
            CalendarPolicy::new(60, None, [(Weekday::Thu, empty), (Weekday::Fri, short)]).unwrap();
        assert!(generate_slots(thursday(), &policy, &[]).is_empty());
        let friday = NaiveDate::from_ymd_opt(2025, 7, 11).unwrap();
        assert!(generate_slots(friday, &policy, &[]).is_empty());
    }

    #[test]
    fn finer_granularity_offers_overlapping_candidates_around_bookings() {
        let hours = WorkingHours::new(time(9, 0), time(12, 0));
        let policy = CalendarPolicy::new(60, Some(30), [(Weekday::Thu, hours)]).unwrap();
        let booked = Appointment::new("Bob", None, thursday().and_time(time(10, 0)), 60);

        let slots = generate_slots(thursday(), &policy, &[booked]);
        assert_eq!(starts(&slots), vec![time(9, 0), time(11, 0)]);
    }

    #[test]
    fn cancelled_appointments_do_not_block() {
        let policy = CalendarPolicy::business_week();
        let mut cancelled = Appointment::new("Bob", None, thursday().and_time(time(9, 0)), 60);
        cancelled.status = AppointmentStatus::Cancelled;

        let slots = generate_slots(thursday(), &policy, &[cancelled]);
        assert_eq!(slots.len(), 8);
        assert_eq!(slots[0].start.time(), time(9, 0));
    }
}
