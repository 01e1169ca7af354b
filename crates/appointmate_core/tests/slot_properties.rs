//! Property tests for the free-slot generator.

use appointmate_core::{
    generate_slots, Appointment, AppointmentStatus, CalendarPolicy, WorkingHours,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use proptest::prelude::*;

fn thursday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, 10).unwrap()
}

/// Duration and a granularity that divides it.
fn duration_and_granularity() -> impl Strategy<Value = (u32, u32)> {
    prop_oneof![Just(15u32), Just(30), Just(45), Just(60), Just(90)].prop_flat_map(|duration| {
        let divisors: Vec<u32> = [5u32, 15, 30, 45, 60, 90]
            .into_iter()
            .filter(|step| duration % step == 0)
            .collect();
        (Just(duration), proptest::sample::select(divisors))
    })
}

/// Opening minute of day and window length in minutes, closing before midnight.
fn window() -> impl Strategy<Value = (u32, u32)> {
    (6u32 * 60..12 * 60).prop_flat_map(|open| (Just(open), 0u32..=(23 * 60 + 59 - open)))
}

/// Existing appointments as (start minute of day, length, cancelled).
fn existing() -> impl Strategy<Value = Vec<(u32, u32, bool)>> {
    prop::collection::vec((0u32..23 * 60, 5u32..=120, any::<bool>()), 0..8)
}

fn minute_of_day(minutes: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0).unwrap()
}

fn build(
    (duration, granularity): (u32, u32),
    (open, length): (u32, u32),
    raw: &[(u32, u32, bool)],
) -> (CalendarPolicy, Vec<Appointment>, NaiveDateTime, NaiveDateTime) {
    let hours = WorkingHours::new(minute_of_day(open), minute_of_day(open + length));
    let policy = CalendarPolicy::new(duration, Some(granularity), [(Weekday::Thu, hours)]).unwrap();
    let appointments = raw
        .iter()
        .map(|(start, len, cancelled)| {
            let mut appointment =
                Appointment::new("Someone", None, thursday().and_time(minute_of_day(*start)), *len);
            if *cancelled {
                appointment.status = AppointmentStatus::Cancelled;
            }
            appointment
        })
        .collect();
    let (window_open, window_close) = hours.window_on(thursday());
    (policy, appointments, window_open, window_close)
}

proptest! {
    /// Every returned slot fits the window, sits on the grid, and is free.
    #[test]
    fn prop_slots_are_sound(
        sizes in duration_and_granularity(),
        hours in window(),
        raw in existing(),
    ) {
        let (policy, appointments, open, close) = build(sizes, hours, &raw);
        let slots = generate_slots(thursday(), &policy, &appointments);

        for pair in slots.windows(2) {
            prop_assert!(pair[0].start < pair[1].start);
        }
        for slot in &slots {
            prop_assert_eq!(slot.duration_minutes, policy.slot_duration());
            prop_assert!(slot.start >= open);
            prop_assert!(slot.end() <= close);
            let offset = (slot.start - open).num_minutes();
            prop_assert_eq!(offset % i64::from(policy.slot_granularity()), 0);
            for appointment in appointments.iter().filter(|a| a.is_active()) {
                prop_assert!(!appointment.overlaps(slot.start, slot.end()));
            }
        }
    }

    /// Every free grid start inside the window is returned.
    #[test]
    fn prop_slots_are_complete(
        sizes in duration_and_granularity(),
        hours in window(),
        raw in existing(),
    ) {
        let (policy, appointments, open, close) = build(sizes, hours, &raw);
        let slots = generate_slots(thursday(), &policy, &appointments);

        let mut candidate = open;
        while candidate + policy.duration() <= close {
            let end = candidate + policy.duration();
            let free = appointments
                .iter()
                .filter(|a| a.is_active())
                .all(|a| !a.overlaps(candidate, end));
            if free {
                prop_assert!(slots.iter().any(|slot| slot.start == candidate));
            }
            candidate += policy.granularity();
        }
    }

    /// Cancelled appointments never hide a slot.
    #[test]
    fn prop_cancelled_appointments_are_ignored(
        sizes in duration_and_granularity(),
        hours in window(),
        raw in existing(),
    ) {
        let (policy, appointments, _, _) = build(sizes, hours, &raw);
        let active: Vec<Appointment> = appointments.iter().filter(|a| a.is_active()).cloned().collect();
        prop_assert_eq!(
            generate_slots(thursday(), &policy, &appointments),
            generate_slots(thursday(), &policy, &active)
        );
    }
}

#[test]
fn closed_weekday_yields_nothing_whatever_the_bookings() {
    let policy = CalendarPolicy::business_week();
    let saturday = NaiveDate::from_ymd_opt(2025, 7, 12).unwrap();
    assert!(generate_slots(saturday, &policy, &[]).is_empty());

    let start = thursday().and_hms_opt(9, 0, 0).unwrap();
    let blocker = Appointment::new("Someone", None, start, 8 * 60);
    assert!(generate_slots(thursday(), &policy, &[blocker]).is_empty());
}
