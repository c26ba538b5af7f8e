//! Dashboard wire protocol frames.
//!
//! `PushFrame` is the envelope the backend sends over the dashboard
//! WebSocket. The client depends on this crate instead of duplicating
//! the frame shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Application-defined type tag carried by every frame.
///
/// The set is open: the backend may introduce new tags at any time, so
/// unrecognized strings round-trip through [`EventKind::Other`] instead
/// of failing to decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// A client business was created
    BusinessCreated,
    /// A client business was updated
    BusinessUpdated,
    /// An end customer booked a reservation
    ReservationCreated,
    /// Server greeting sent right after the handshake
    ConnectionEstablished,
    /// Client keepalive probe
    Ping,
    /// Server keepalive reply
    Pong,
    /// Any tag this client does not recognize
    Other(String),
}

impl EventKind {
    /// Get the wire string for this kind
    pub fn as_str(&self) -> &str {
        match self {
            Self::BusinessCreated => "business_created",
            Self::BusinessUpdated => "business_updated",
            Self::ReservationCreated => "reservation_created",
            Self::ConnectionEstablished => "connection_established",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Other(tag) => tag.as_str(),
        }
    }

    /// Check if this is a channel control frame rather than a dashboard event
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            Self::ConnectionEstablished | Self::Ping | Self::Pong
        )
    }
}

impl From<String> for EventKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "business_created" => Self::BusinessCreated,
            "business_updated" => Self::BusinessUpdated,
            "reservation_created" => Self::ReservationCreated,
            "connection_established" => Self::ConnectionEstablished,
            "ping" => Self::Ping,
            "pong" => Self::Pong,
            _ => Self::Other(tag),
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single frame received over (or sent down) the dashboard channel.
///
/// Wire shape: `{"type": "<tag>", "payload": {...}}`. The payload is
/// opaque to the transport; the client only inspects `payload.message`
/// when deriving notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushFrame {
    /// Application-defined type tag
    #[serde(rename = "type")]
    pub kind: EventKind,

    /// Event-specific payload as JSON; absent payloads decode to `Null`
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl PushFrame {
    /// Create a new frame with the given kind and payload
    pub fn new(kind: EventKind, payload: Value) -> Self {
        Self { kind, payload }
    }

    /// Outbound keepalive probe; the server answers with a `pong` frame
    pub fn ping() -> Self {
        Self {
            kind: EventKind::Ping,
            payload: Value::Null,
        }
    }

    /// The human-readable message for frames that should surface as a
    /// notification. Frames without `payload.message` never become one.
    pub fn notification_message(&self) -> Option<&str> {
        self.payload.get("message").and_then(Value::as_str)
    }
}
