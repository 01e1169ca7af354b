//! Appointment domain model.
//!
//! # Responsibility
//! - Define the canonical appointment record owned by the store.
//! - Validate client identity and interval shape before persistence.
//!
//! # Invariants
//! - `id` is stable and never reused.
//! - `duration_minutes` and client identity never change after creation.
//! - `[start, end)` stays within one calendar date.
//! - Cancellation flips `status`; rows are never removed.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Upper bound on stored client name length, in characters.
pub const CLIENT_NAME_MAX_CHARS: usize = 200;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Stable identifier for one appointment.
pub type AppointmentId = Uuid;

/// Lifecycle state of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// Holds its interval; participates in overlap checks.
    Active,
    /// Kept for history; frees its interval.
    Cancelled,
}

impl AppointmentStatus {
    /// Stable storage value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Validation failures for appointment fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppointmentValidationError {
    EmptyClientName,
    ClientNameTooLong { max_chars: usize },
    InvalidEmail(String),
    ZeroDuration,
    /// Start carries seconds or sub-second precision.
    StartNotWholeMinute { start: NaiveDateTime },
    CrossesMidnight { start: NaiveDateTime },
}

impl Display for AppointmentValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyClientName => write!(f, "client name must not be blank"),
            Self::ClientNameTooLong { max_chars } => {
                write!(f, "client name exceeds {max_chars} characters")
            }
            Self::InvalidEmail(value) => write!(f, "invalid client email: `{value}`"),
            Self::ZeroDuration => write!(f, "appointment duration must be greater than zero"),
            Self::StartNotWholeMinute { start } => {
                write!(f, "appointment start {start} must fall on a whole minute")
            }
            Self::CrossesMidnight { start } => {
                write!(f, "appointment starting at {start} ends on a later date")
            }
        }
    }
}

impl Error for AppointmentValidationError {}

/// Canonical appointment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    /// Trimmed display name as given by the client.
    pub client_name: String,
    pub client_email: Option<String>,
    /// Wall-clock start in the professional's fixed zone.
    pub start: NaiveDateTime,
    /// Copied from the calendar policy at booking time.
    pub duration_minutes: u32,
    pub status: AppointmentStatus,
}

impl Appointment {
    /// Creates an active appointment with a generated id.
    ///
    /// Name is trimmed and a blank email is treated as absent. Call
    /// `validate()` before persisting.
    pub fn new(
        client_name: impl Into<String>,
        client_email: Option<String>,
        start: NaiveDateTime,
        duration_minutes: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_name: client_name.into().trim().to_string(),
            client_email: normalize_email(client_email),
            start,
            duration_minutes,
            status: AppointmentStatus::Active,
        }
    }

    /// Exclusive end of the occupied interval.
    pub fn end(&self) -> NaiveDateTime {
        self.start + Duration::minutes(i64::from(self.duration_minutes))
    }

    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn is_active(&self) -> bool {
        self.status == AppointmentStatus::Active
    }

    /// Half-open overlap test against `[start, end)`.
    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        start < self.end() && end > self.start
    }

    /// Lowercased lookup key used for client-name matching.
    pub fn client_key(&self) -> String {
        client_key(&self.client_name)
    }

    pub fn validate(&self) -> Result<(), AppointmentValidationError> {
        validate_client_name(&self.client_name)?;
        if let Some(email) = self.client_email.as_deref() {
            validate_email(email)?;
        }
        if self.duration_minutes == 0 {
            return Err(AppointmentValidationError::ZeroDuration);
        }
        // Storage keeps minute-resolution instants.
        if self.start.second() != 0 || self.start.nanosecond() != 0 {
            return Err(AppointmentValidationError::StartNotWholeMinute { start: self.start });
        }
        let end = self.end();
        // A midnight end still belongs to the start date.
        let last_instant = end - Duration::nanoseconds(1);
        if last_instant.date() != self.start.date() {
            return Err(AppointmentValidationError::CrossesMidnight { start: self.start });
        }
        Ok(())
    }
}

/// Normalizes a client name into the exact-match lookup key.
///
/// Matching is exact after trimming and Unicode lowercasing, never fuzzy, so
/// one client cannot see another's appointments through a near-miss name.
pub fn client_key(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn validate_client_name(name: &str) -> Result<(), AppointmentValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppointmentValidationError::EmptyClientName);
    }
    if trimmed.chars().count() > CLIENT_NAME_MAX_CHARS {
        return Err(AppointmentValidationError::ClientNameTooLong {
            max_chars: CLIENT_NAME_MAX_CHARS,
        });
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AppointmentValidationError> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(AppointmentValidationError::InvalidEmail(email.to_string()))
    }
}

/// Trims an optional email and maps blank input to `None`.
pub fn normalize_email(email: Option<String>) -> Option<String> {
    email
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
