//! Domain model for the availability and booking engine.
//!
//! # Responsibility
//! - Define the calendar policy, appointment record, and slot value types.
//! - Keep validation rules next to the types they protect.
//!
//! # Invariants
//! - Every appointment is identified by a stable `AppointmentId`.
//! - Cancellation is a status flag, never a row removal.
//! - Slots are transient values and are never persisted.

pub mod appointment;
pub mod policy;
pub mod slot;
