//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the appointment store contract used by booking services.
//! - Isolate SQLite query and transaction details from orchestration.
//!
//! # Invariants
//! - Writes validate appointments before any SQL mutation.
//! - Check-and-write is one transaction; callers never split it.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`,
//!   `StorageTimeout`) in addition to DB transport errors.

pub mod appointment_repo;
