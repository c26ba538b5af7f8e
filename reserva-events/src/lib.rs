//! Shared wire protocol types for the Reserva dashboard channel.
//!
//! This crate defines the types that cross the WebSocket boundary between:
//! - the Reserva backend - the event producer
//! - reserva-push - the dashboard push client
//!
//! # Modules
//! - [`frame`] - dashboard push frames (PushFrame, EventKind)

pub mod frame;

// Re-export commonly used types at crate root
pub use frame::{EventKind, PushFrame};
