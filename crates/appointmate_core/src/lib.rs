//! Availability and booking engine for a single professional's calendar.
//! This crate is the single source of truth for the no-double-booking
//! invariant.

pub mod availability;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use availability::slots::generate_slots;
pub use config::{ConfigError, EngineConfig};
pub use logging::{default_log_level, init_logging, LoggingError};
pub use model::appointment::{
    Appointment, AppointmentId, AppointmentStatus, AppointmentValidationError,
};
pub use model::policy::{CalendarPolicy, PolicyError, WorkingHours};
pub use model::slot::Slot;
pub use repo::appointment_repo::{
    AppointmentRepository, RepoError, RepoResult, SqliteAppointmentRepository,
};
pub use service::booking_service::{
    BookRequest, BookingError, BookingService, InvalidInput, RescheduleRequest,
};
pub use service::events::{
    BookingEvent, BookingEventKind, DiscardSink, NotificationError, NotificationSink,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
