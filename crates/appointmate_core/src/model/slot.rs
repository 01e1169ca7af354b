//! Slot value type.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

/// Candidate interval offered to a client; produced per request, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Slot {
    pub start: NaiveDateTime,
    pub duration_minutes: u32,
}

impl Slot {
    pub fn new(start: NaiveDateTime, duration_minutes: u32) -> Self {
        Self {
            start,
            duration_minutes,
        }
    }

    /// Exclusive end of the slot.
    pub fn end(&self) -> NaiveDateTime {
        self.start + Duration::minutes(i64::from(self.duration_minutes))
    }
}
