//! Availability and booking use-case service.
//!
//! # Responsibility
//! - Answer "what's free" by feeding store reads into the slot generator.
//! - Validate booking/reschedule input against the calendar policy.
//! - Delegate check-and-write to one atomic store call and emit events.
//!
//! # Invariants
//! - Never splits availability check and write across two store calls.
//! - Never retries a failed write; retry policy belongs to the caller.
//! - Notification failures are logged and never roll back a booking.
//! - Slots are recomputed on every call, never cached.

use crate::availability::slots::generate_slots;
use crate::model::appointment::{Appointment, AppointmentId, AppointmentValidationError};
use crate::model::policy::CalendarPolicy;
use crate::model::slot::Slot;
use crate::repo::appointment_repo::{AppointmentRepository, RepoError};
use crate::service::events::{BookingEvent, NotificationSink};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Caller input problems; never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidInput {
    /// Name or email failed validation.
    Appointment(AppointmentValidationError),
    /// Interval does not fit the weekday's working window (or the day is closed).
    OutsideWorkingHours { start: NaiveDateTime },
    /// Start precedes the caller-supplied `not_before`.
    StartInPast {
        start: NaiveDateTime,
        not_before: NaiveDateTime,
    },
}

impl Display for InvalidInput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Appointment(err) => write!(f, "{err}"),
            Self::OutsideWorkingHours { start } => {
                write!(f, "{start} is outside working hours")
            }
            Self::StartInPast { start, not_before } => {
                write!(f, "{start} is earlier than {not_before}")
            }
        }
    }
}

impl Error for InvalidInput {}

/// Service error for booking use-cases.
#[derive(Debug)]
pub enum BookingError {
    InvalidInput(InvalidInput),
    /// Slot was taken, typically by a concurrent booking; re-fetch slots.
    SlotUnavailable {
        requested_start: NaiveDateTime,
        conflicting: AppointmentId,
    },
    /// Appointment does not exist or is no longer active.
    NotFound(AppointmentId),
    /// Store timed out or is unreachable; fatal for this request.
    StorageUnavailable(RepoError),
    /// Overlap reached the storage guard. Indicates a bug, not a race.
    InvariantViolation(String),
    /// Any other persistence failure.
    Repo(RepoError),
}

impl BookingError {
    /// Stable code for logs and caller-side dispatch.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::SlotUnavailable { .. } => "slot_unavailable",
            Self::NotFound(_) => "not_found",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::InvariantViolation(_) => "invariant_violation",
            Self::Repo(_) => "repo_error",
        }
    }
}

impl Display for BookingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(err) => write!(f, "invalid input: {err}"),
            Self::SlotUnavailable {
                requested_start, ..
            } => write!(f, "slot at {requested_start} is no longer available"),
            Self::NotFound(id) => write!(f, "appointment not found: {id}"),
            Self::StorageUnavailable(err) => write!(f, "storage unavailable: {err}"),
            Self::InvariantViolation(details) => {
                write!(f, "appointment overlap invariant violated: {details}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for BookingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidInput(InvalidInput::Appointment(err)) => Some(err),
            Self::StorageUnavailable(err) | Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for BookingError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::InvalidInput(InvalidInput::Appointment(err)),
            RepoError::Conflict {
                requested_start,
                conflicting,
            } => Self::SlotUnavailable {
                requested_start,
                conflicting,
            },
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::StorageTimeout(_) => Self::StorageUnavailable(value),
            RepoError::InvariantViolation(details) => Self::InvariantViolation(details),
            other => Self::Repo(other),
        }
    }
}

impl From<AppointmentValidationError> for BookingError {
    fn from(value: AppointmentValidationError) -> Self {
        Self::InvalidInput(InvalidInput::Appointment(value))
    }
}

/// Input for `BookingService::book`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRequest {
    pub client_name: String,
    /// Blank strings are treated as absent.
    pub client_email: Option<String>,
    pub date: NaiveDate,
    pub start: NaiveTime,
    /// Caller's notion of "now"; earlier starts are rejected when set.
    pub not_before: Option<NaiveDateTime>,
}

/// Input for `BookingService::reschedule`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RescheduleRequest {
    pub appointment_id: AppointmentId,
    pub new_date: NaiveDate,
    pub new_start: NaiveTime,
    pub not_before: Option<NaiveDateTime>,
}

/// Booking engine facade over a store, a policy and a notification sink.
pub struct BookingService<R: AppointmentRepository, N: NotificationSink> {
    repo: R,
    policy: CalendarPolicy,
    sink: N,
}

impl<R: AppointmentRepository, N: NotificationSink> BookingService<R, N> {
    pub fn new(repo: R, policy: CalendarPolicy, sink: N) -> Self {
        Self { repo, policy, sink }
    }

    pub fn policy(&self) -> &CalendarPolicy {
        &self.policy
    }

    /// Lists free slots on `date`, ascending.
    ///
    /// The result is a snapshot; `book` re-validates against live data.
    pub fn list_slots(&self, date: NaiveDate) -> Result<Vec<Slot>, BookingError> {
        if self.policy.hours_for(date.weekday()).is_none() {
            return Ok(Vec::new());
        }
        let existing = self.repo.appointments_on(date)?;
        Ok(generate_slots(date, &self.policy, &existing))
    }

    /// Books `request.start` on `request.date` for one client.
    ///
    /// # Errors
    /// - `InvalidInput` for a blank name, malformed email, a start that is
    ///   not a whole minute, a start outside working hours, or a start
    ///   before `not_before`.
    /// - `SlotUnavailable` when an active appointment overlaps the slot.
    /// - `StorageUnavailable` when the store lock wait times out.
    pub fn book(&mut self, request: &BookRequest) -> Result<Appointment, BookingError> {
        let started_at = Instant::now();
        let start = request.date.and_time(request.start);

        let result = self.book_inner(request, start);
        match &result {
            Ok(appointment) => {
                info!(
                    "event=appointment_book module=service status=ok appointment_id={} start={} duration_minutes={} duration_ms={}",
                    appointment.id,
                    appointment.start,
                    appointment.duration_minutes,
                    started_at.elapsed().as_millis()
                );
                self.emit(BookingEvent::booked(appointment.clone()));
            }
            Err(err) => log_failure("appointment_book", start, err, started_at),
        }
        result
    }

    fn book_inner(
        &mut self,
        request: &BookRequest,
        start: NaiveDateTime,
    ) -> Result<Appointment, BookingError> {
        let candidate = Appointment::new(
            request.client_name.as_str(),
            request.client_email.clone(),
            start,
            self.policy.slot_duration(),
        );
        candidate.validate()?;
        check_not_before(start, request.not_before)?;
        if !self.policy.fits_working_hours(start) {
            return Err(BookingError::InvalidInput(
                InvalidInput::OutsideWorkingHours { start },
            ));
        }

        Ok(self.repo.insert_appointment(&candidate)?)
    }

    /// Moves an active appointment to a new start in one atomic store call.
    ///
    /// Duration and client identity are carried over unchanged.
    pub fn reschedule(&mut self, request: &RescheduleRequest) -> Result<Appointment, BookingError> {
        let started_at = Instant::now();
        let new_start = request.new_date.and_time(request.new_start);

        let result = self.reschedule_inner(request, new_start);
        match &result {
            Ok((appointment, previous_start)) => {
                info!(
                    "event=appointment_reschedule module=service status=ok appointment_id={} from={} to={} duration_ms={}",
                    appointment.id,
                    previous_start,
                    appointment.start,
                    started_at.elapsed().as_millis()
                );
                self.emit(BookingEvent::rescheduled(
                    appointment.clone(),
                    *previous_start,
                ));
            }
            Err(err) => log_failure("appointment_reschedule", new_start, err, started_at),
        }
        result.map(|(appointment, _)| appointment)
    }

    fn reschedule_inner(
        &mut self,
        request: &RescheduleRequest,
        new_start: NaiveDateTime,
    ) -> Result<(Appointment, NaiveDateTime), BookingError> {
        let id = request.appointment_id;
        // Duration is immutable, so this read is safe outside the write
        // transaction; state is re-checked by `move_appointment`.
        let current = match self.repo.get_appointment(id)? {
            Some(appointment) if appointment.is_active() => appointment,
            _ => return Err(BookingError::NotFound(id)),
        };

        Appointment {
            start: new_start,
            ..current.clone()
        }
        .validate()?;
        check_not_before(new_start, request.not_before)?;
        if !self
            .policy
            .interval_fits_working_hours(new_start, current.duration_minutes)
        {
            return Err(BookingError::InvalidInput(
                InvalidInput::OutsideWorkingHours { start: new_start },
            ));
        }

        let moved = self.repo.move_appointment(id, new_start)?;
        Ok((moved, current.start))
    }

    /// Cancels an appointment, freeing its interval.
    ///
    /// Cancelling an already-cancelled appointment returns it unchanged and
    /// emits nothing.
    pub fn cancel(&mut self, id: AppointmentId) -> Result<Appointment, BookingError> {
        let started_at = Instant::now();

        match self.cancel_inner(id) {
            Ok((appointment, was_active)) => {
                info!(
                    "event=appointment_cancel module=service status=ok appointment_id={} already_cancelled={} duration_ms={}",
                    appointment.id,
                    !was_active,
                    started_at.elapsed().as_millis()
                );
                if was_active {
                    self.emit(BookingEvent::cancelled(appointment.clone()));
                }
                Ok(appointment)
            }
            Err(err) => {
                warn!(
                    "event=appointment_cancel module=service status=error appointment_id={} error_code={} duration_ms={}",
                    id,
                    err.code(),
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
        }
    }

    fn cancel_inner(&mut self, id: AppointmentId) -> Result<(Appointment, bool), BookingError> {
        let was_active = self
            .repo
            .get_appointment(id)?
            .ok_or(BookingError::NotFound(id))?
            .is_active();
        let cancelled = self.repo.cancel_appointment(id)?;
        Ok((cancelled, was_active))
    }

    /// Active appointments for a client, ascending by start.
    ///
    /// Matching is exact after trimming and lowercasing. No match is an empty
    /// list, not an error.
    pub fn list_by_client(&self, name: &str) -> Result<Vec<Appointment>, BookingError> {
        Ok(self.repo.appointments_for_client(name)?)
    }

    /// Resolves the active appointment a client holds at `start`.
    pub fn find_for_client_at(
        &self,
        name: &str,
        start: NaiveDateTime,
    ) -> Result<Option<Appointment>, BookingError> {
        Ok(self
            .repo
            .appointments_for_client(name)?
            .into_iter()
            .find(|appointment| appointment.start == start))
    }

    /// Active appointments on `date`, ascending by start.
    pub fn schedule_for(&self, date: NaiveDate) -> Result<Vec<Appointment>, BookingError> {
        Ok(self.repo.appointments_on(date)?)
    }

    /// One appointment by id, including cancelled history.
    pub fn appointment(&self, id: AppointmentId) -> Result<Option<Appointment>, BookingError> {
        Ok(self.repo.get_appointment(id)?)
    }

    fn emit(&self, event: BookingEvent) {
        if let Err(err) = self.sink.notify(&event) {
            warn!(
                "event=notification_dispatch module=service status=error kind={} appointment_id={} error={}",
                event.kind.as_str(),
                event.appointment.id,
                err
            );
        }
    }
}

fn check_not_before(
    start: NaiveDateTime,
    not_before: Option<NaiveDateTime>,
) -> Result<(), BookingError> {
    match not_before {
        Some(not_before) if start < not_before => Err(BookingError::InvalidInput(
            InvalidInput::StartInPast { start, not_before },
        )),
        _ => Ok(()),
    }
}

fn log_failure(event: &str, start: NaiveDateTime, err: &BookingError, started_at: Instant) {
    let elapsed = started_at.elapsed().as_millis();
    match err {
        BookingError::InvariantViolation(_) | BookingError::Repo(_) => error!(
            "event={} module=service status=error start={} error_code={} duration_ms={} error={}",
            event,
            start,
            err.code(),
            elapsed,
            err
        ),
        BookingError::StorageUnavailable(_) => error!(
            "event={} module=service status=error start={} error_code={} duration_ms={}",
            event,
            start,
            err.code(),
            elapsed
        ),
        _ => warn!(
            "event={} module=service status=rejected start={} error_code={} duration_ms={}",
            event,
            start,
            err.code(),
            elapsed
        ),
    }
}
