//! Availability computation.
//!
//! # Responsibility
//! - Turn a date, the calendar policy and that date's bookings into free slots.
//!
//! # Invariants
//! - Generation is pure: no storage access, no wall-clock reads.
//! - Results are never cached; callers regenerate per request.

pub mod slots;
