//! Reserva dashboard push client.
//!
//! Client-side subsystem for the realtime dashboard channel of the
//! Reserva appointment-booking platform.
//!
//! This library provides:
//! - WebSocket connection management with fixed-interval reconnect
//! - A bounded, ordered notification store with read/unread state
//! - An in-process event bus connecting the two
//! - File + environment configuration

// =============================================================================
// Lints - Enforce code quality and consistency
// =============================================================================

// Deny truly dangerous patterns (these will fail the build)
#![deny(unsafe_code)]
#![deny(unused_must_use)]

pub mod bus;
pub mod channel;
pub mod config;
pub mod notifications;
