//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls and slot generation into booking use-cases.
//! - Keep callers decoupled from storage details.

pub mod booking_service;
pub mod events;
