//! Calendar policy model.
//!
//! # Responsibility
//! - Describe working hours per weekday and the fixed appointment duration.
//! - Answer pure lookups used by slot generation and booking validation.
//!
//! # Invariants
//! - Duration and granularity are positive; granularity divides duration.
//! - `close >= open` for every open weekday (equal means an empty window).
//! - A weekday without hours is closed, never an error.
//! - The policy is immutable once built.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use once_cell::sync::Lazy;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Default appointment length used by `CalendarPolicy::business_week`.
pub const DEFAULT_APPOINTMENT_MINUTES: u32 = 60;

static BUSINESS_WEEK: Lazy<CalendarPolicy> = Lazy::new(|| {
    let open = NaiveTime::from_hms_opt(9, 0, 0).expect("09:00 is a valid time");
    let close = NaiveTime::from_hms_opt(17, 0, 0).expect("17:00 is a valid time");
    let window = WorkingHours::new(open, close);
    let weekdays = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
    ];
    CalendarPolicy::new(
        DEFAULT_APPOINTMENT_MINUTES,
        None,
        weekdays.map(|weekday| (weekday, window)),
    )
    .expect("business week policy is valid")
});

/// Opening window for one weekday, in the professional's fixed zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl WorkingHours {
    pub fn new(open: NaiveTime, close: NaiveTime) -> Self {
        Self { open, close }
    }

    /// Working window on `date` as half-open `[open, close)` datetimes.
    pub fn window_on(&self, date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        (date.and_time(self.open), date.and_time(self.close))
    }
}

/// Policy construction errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    ZeroDuration,
    ZeroGranularity,
    GranularityMismatch {
        duration_minutes: u32,
        granularity_minutes: u32,
    },
    InvalidHours {
        weekday: Weekday,
        open: NaiveTime,
        close: NaiveTime,
    },
}

impl Display for PolicyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroDuration => write!(f, "appointment duration must be greater than zero"),
            Self::ZeroGranularity => write!(f, "slot granularity must be greater than zero"),
            Self::GranularityMismatch {
                duration_minutes,
                granularity_minutes,
            } => write!(
                f,
                "slot granularity {granularity_minutes}m does not divide duration {duration_minutes}m"
            ),
            Self::InvalidHours {
                weekday,
                open,
                close,
            } => write!(
                f,
                "working hours for {weekday} close at {close} before opening at {open}"
            ),
        }
    }
}

impl Error for PolicyError {}

/// Immutable working-hours and duration policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarPolicy {
    /// Indexed by `Weekday::num_days_from_monday()`.
    hours: [Option<WorkingHours>; 7],
    duration_minutes: u32,
    granularity_minutes: u32,
}

impl CalendarPolicy {
    /// Builds a validated policy.
    ///
    /// `granularity_minutes = None` uses the appointment duration. A weekday
    /// listed twice keeps its last entry.
    pub fn new(
        duration_minutes: u32,
        granularity_minutes: Option<u32>,
        hours: impl IntoIterator<Item = (Weekday, WorkingHours)>,
    ) -> Result<Self, PolicyError> {
        if duration_minutes == 0 {
            return Err(PolicyError::ZeroDuration);
        }
        let granularity_minutes = granularity_minutes.unwrap_or(duration_minutes);
        if granularity_minutes == 0 {
            return Err(PolicyError::ZeroGranularity);
        }
        if duration_minutes % granularity_minutes != 0 {
            return Err(PolicyError::GranularityMismatch {
                duration_minutes,
                granularity_minutes,
            });
        }

        let mut table = [None; 7];
        for (weekday, window) in hours {
            if window.close < window.open {
                return Err(PolicyError::InvalidHours {
                    weekday,
                    open: window.open,
                    close: window.close,
                });
            }
            table[weekday_index(weekday)] = Some(window);
        }

        Ok(Self {
            hours: table,
            duration_minutes,
            granularity_minutes,
        })
    }

    /// Monday to Friday, 09:00 to 17:00, one-hour appointments.
    pub fn business_week() -> Self {
        BUSINESS_WEEK.clone()
    }

    /// Returns the working window for `weekday`, or `None` when closed.
    pub fn hours_for(&self, weekday: Weekday) -> Option<WorkingHours> {
        self.hours[weekday_index(weekday)]
    }

    /// Fixed appointment length in minutes.
    pub fn slot_duration(&self) -> u32 {
        self.duration_minutes
    }

    /// Step between candidate slot starts in minutes.
    pub fn slot_granularity(&self) -> u32 {
        self.granularity_minutes
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.duration_minutes))
    }

    pub fn granularity(&self) -> Duration {
        Duration::minutes(i64::from(self.granularity_minutes))
    }

    /// Returns whether a policy-length appointment at `start` lies inside the
    /// working window of `start`'s weekday.
    pub fn fits_working_hours(&self, start: NaiveDateTime) -> bool {
        self.interval_fits_working_hours(start, self.duration_minutes)
    }

    /// Same as `fits_working_hours` for an explicit length, used when an
    /// existing appointment keeps the duration it was booked with.
    pub fn interval_fits_working_hours(&self, start: NaiveDateTime, duration_minutes: u32) -> bool {
        let Some(window) = self.hours_for(start.weekday()) else {
            return false;
        };
        let (open, close) = window.window_on(start.date());
        let end = start + Duration::minutes(i64::from(duration_minutes));
        start >= open && end <= close
    }
}

fn weekday_index(weekday: Weekday) -> usize {
    weekday.num_days_from_monday() as usize
}

#[cfg(test)]
mod tests {
    use super::{CalendarPolicy, PolicyError, WorkingHours};
    use chrono::{NaiveDate, NaiveTime, Weekday};

    fn time(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn business_week_is_closed_on_weekends() {
        let policy = CalendarPolicy::business_week();
        assert!(policy.hours_for(Weekday::Sat).is_none());
        assert!(policy.hours_for(Weekday::Sun).is_none());
        let monday = policy.hours_for(Weekday::Mon).unwrap();
        assert_eq!(monday.open, time(9, 0));
        assert_eq!(monday.close, time(17, 0));
        assert_eq!(policy.slot_duration(), 60);
        assert_eq!(policy.slot_granularity(), 60);
    }

    #[test]
    fn business_week_matches_validated_construction() {
        let window = WorkingHours::new(time(9, 0), time(17, 0));
        let built = CalendarPolicy::new(
            60,
            None,
            [
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ]
            .map(|weekday| (weekday, window)),
        )
        .unwrap();
        assert_eq!(CalendarPolicy::business_week(), built);
    }

    #[test]
    fn granularity_defaults_to_duration() {
        let policy = CalendarPolicy::new(45, None, []).unwrap();
        assert_eq!(policy.slot_granularity(), 45);
    }

    #[test]
    fn rejects_zero_duration_and_non_dividing_granularity() {
        assert_eq!(
            CalendarPolicy::new(0, None, []).unwrap_err(),
            PolicyError::ZeroDuration
        );
        assert_eq!(
            CalendarPolicy::new(60, Some(0), []).unwrap_err(),
            PolicyError::ZeroGranularity
        );
        assert!(matches!(
            CalendarPolicy::new(60, Some(25), []).unwrap_err(),
            PolicyError::GranularityMismatch { .. }
        ));
    }

    #[test]
    fn rejects_inverted_hours_but_accepts_empty_window() {
        let inverted = WorkingHours::new(time(17, 0), time(9, 0));
        assert!(matches!(
            CalendarPolicy::new(60, None, [(Weekday::Tue, inverted)]).unwrap_err(),
            PolicyError::InvalidHours {
                weekday: Weekday::Tue,
                ..
            }
        ));

        let empty = WorkingHours::new(time(9, 0), time(9, 0));
        let policy = CalendarPolicy::new(60, None, [(Weekday::Tue, empty)]).unwrap();
        assert_eq!(policy.hours_for(Weekday::Tue), Some(empty));
    }

    #[test]
    fn fits_working_hours_checks_both_edges() {
        let policy = CalendarPolicy::business_week();
        let thursday = NaiveDate::from_ymd_opt(2025, 7, 10).unwrap();
        assert!(policy.fits_working_hours(thursday.and_time(time(9, 0))));
        assert!(policy.fits_working_hours(thursday.and_time(time(16, 0))));
        assert!(!policy.fits_working_hours(thursday.and_time(time(16, 30))));
        assert!(!policy.fits_working_hours(thursday.and_time(time(8, 30))));

        let saturday = NaiveDate::from_ymd_opt(2025, 7, 12).unwrap();
        assert!(!policy.fits_working_hours(saturday.and_time(time(10, 0))));
    }
}
