//! In-process event bus for channel lifecycle and inbound frames.
//!
//! The connection manager publishes here; the notification store and any
//! other interested party subscribe. Publishing never blocks and never
//! fails - a bus with no subscribers simply drops events.

use reserva_events::PushFrame;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Buffered events per subscriber before the channel reports lag
const BUS_CAPACITY: usize = 256;

/// Events published by the push channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The channel completed a handshake and is open
    Connected,
    /// The channel closed (cleanly, on error, or on a failed attempt)
    Disconnected,
    /// A decoded frame arrived over the channel
    Frame(PushFrame),
}

impl ChannelEvent {
    /// Get the event type as a string (for logging/filtering)
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Frame(_) => "frame",
        }
    }
}

/// Broadcast bus shared between the channel and its consumers.
pub struct Bus {
    tx: broadcast::Sender<ChannelEvent>,
}

pub type SharedBus = Arc<Bus>;

/// Create a new shared bus
pub fn create_bus() -> SharedBus {
    Arc::new(Bus::new())
}

impl Bus {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Publish an event to all current subscribers
    pub fn publish(&self, event: ChannelEvent) {
        // send only errors when there are no receivers, which is fine
        let _ = self.tx.send(event);
    }

    /// Subscribe to events published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reserva_events::EventKind;

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let bus = create_bus();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(ChannelEvent::Connected);

        assert_eq!(rx1.recv().await.unwrap(), ChannelEvent::Connected);
        assert_eq!(rx2.recv().await.unwrap(), ChannelEvent::Connected);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_silent() {
        let bus = create_bus();
        // No subscribers yet - must not panic or error
        bus.publish(ChannelEvent::Frame(PushFrame::new(
            EventKind::ReservationCreated,
            serde_json::json!({"message": "New booking"}),
        )));
    }
}
