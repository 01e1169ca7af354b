//! Booking lifecycle events and the notification sink seam.
//!
//! # Responsibility
//! - Describe confirmed booking changes for downstream delivery.
//! - Define the sink contract the notification collaborator implements.
//!
//! # Invariants
//! - Events are emitted only after the store commit succeeded.
//! - Sink failures are reported back but never undo a committed change.

use crate::model::appointment::Appointment;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// Kind of confirmed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingEventKind {
    Booked,
    Rescheduled,
    Cancelled,
}

impl BookingEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Booked => "booked",
            Self::Rescheduled => "rescheduled",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Confirmed change handed to the notification collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingEvent {
    pub kind: BookingEventKind,
    /// State of the appointment after the change.
    pub appointment: Appointment,
    /// Start before a reschedule; `None` for other kinds.
    pub previous_start: Option<NaiveDateTime>,
}

impl BookingEvent {
    pub fn booked(appointment: Appointment) -> Self {
        Self {
            kind: BookingEventKind::Booked,
            appointment,
            previous_start: None,
        }
    }

    pub fn rescheduled(appointment: Appointment, previous_start: NaiveDateTime) -> Self {
        Self {
            kind: BookingEventKind::Rescheduled,
            appointment,
            previous_start: Some(previous_start),
        }
    }

    pub fn cancelled(appointment: Appointment) -> Self {
        Self {
            kind: BookingEventKind::Cancelled,
            appointment,
            previous_start: None,
        }
    }
}

/// Delivery failure reported by a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationError {
    message: String,
}

impl NotificationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for NotificationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification delivery failed: {}", self.message)
    }
}

impl Error for NotificationError {}

/// Receiver of confirmed booking events.
///
/// Implementations should hand the event off quickly (queue, channel); the
/// booking call waits for `notify` to return but ignores its outcome.
pub trait NotificationSink {
    fn notify(&self, event: &BookingEvent) -> Result<(), NotificationError>;
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSink;

impl NotificationSink for DiscardSink {
    fn notify(&self, _event: &BookingEvent) -> Result<(), NotificationError> {
        Ok(())
    }
}

/// Forwards events to a consumer thread.
impl NotificationSink for Sender<BookingEvent> {
    fn notify(&self, event: &BookingEvent) -> Result<(), NotificationError> {
        self.send(event.clone())
            .map_err(|_| NotificationError::new("event receiver disconnected"))
    }
}

impl<S: NotificationSink + ?Sized> NotificationSink for Arc<S> {
    fn notify(&self, event: &BookingEvent) -> Result<(), NotificationError> {
        (**self).notify(event)
    }
}

#[cfg(test)]
mod tests {
    use super::{BookingEvent, BookingEventKind, NotificationSink};
    use crate::model::appointment::Appointment;
    use chrono::NaiveDate;
    use std::sync::mpsc;

    #[test]
    fn channel_sink_forwards_and_reports_disconnect() {
        let start = NaiveDate::from_ymd_opt(2025, 7, 10)
            .unwrap()
            .and_hms_opt(11, 0, 0)
            .unwrap();
        let event = BookingEvent::booked(Appointment::new("Alice", None, start, 60));

        let (sender, receiver) = mpsc::channel();
        sender.notify(&event).unwrap();
        let received = receiver.recv().unwrap();
        assert_eq!(received.kind, BookingEventKind::Booked);
        assert_eq!(received.appointment.start, start);

        drop(receiver);
        assert!(sender.notify(&event).is_err());
    }
}
