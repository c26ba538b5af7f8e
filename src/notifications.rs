//! Notification store derived from dashboard push frames.
//!
//! Frames whose payload carries a `message` become notifications; every
//! non-control frame also lands in a recent-updates feed. Both lists are
//! kept most-recent-first and capped at the 50 newest entries.

use crate::bus::{ChannelEvent, SharedBus};
use chrono::{DateTime, Utc};
use reserva_events::{EventKind, PushFrame};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Retained notification history (oldest dropped first)
pub const MAX_NOTIFICATIONS: usize = 50;

/// Retained recent-updates history
pub const MAX_RECENT_UPDATES: usize = 50;

/// A user-facing record derived from a qualifying push frame.
///
/// Owned exclusively by the store; consumers always receive clones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    /// Monotonic per-store id, assigned at arrival
    pub id: u64,
    pub kind: EventKind,
    pub message: String,
    pub received_at: DateTime<Utc>,
    pub read: bool,
}

#[derive(Default)]
struct StoreState {
    /// Most-recent-first, never longer than MAX_NOTIFICATIONS
    notifications: VecDeque<Notification>,
    /// Most-recent-first feed of all non-control frames
    recent_updates: VecDeque<PushFrame>,
}

/// Bounded notification store fed by the push channel.
pub struct NotificationStore {
    state: Arc<RwLock<StoreState>>,
    next_id: AtomicU64,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Ingest one decoded frame.
    ///
    /// Prepend-then-truncate keeps the newest entries regardless of how
    /// large an insertion burst is, so the cap holds at every point an
    /// observer can read the list.
    pub async fn on_frame(&self, frame: &PushFrame) {
        let mut state = self.state.write().await;

        if !frame.kind.is_control() {
            state.recent_updates.push_front(frame.clone());
            state.recent_updates.truncate(MAX_RECENT_UPDATES);
        }

        if let Some(message) = frame.notification_message() {
            let notification = Notification {
                id: self.next_id.fetch_add(1, Ordering::Relaxed),
                kind: frame.kind.clone(),
                message: message.to_string(),
                received_at: Utc::now(),
                read: false,
            };
            debug!(kind = %notification.kind, id = notification.id, "New notification");
            state.notifications.push_front(notification);
            state.notifications.truncate(MAX_NOTIFICATIONS);
        }
    }

    /// Mark one notification as read. Unknown ids are a silent no-op -
    /// the entry may already have been cleared.
    pub async fn mark_as_read(&self, id: u64) {
        let mut state = self.state.write().await;
        if let Some(notification) = state.notifications.iter_mut().find(|n| n.id == id) {
            notification.read = true;
        }
    }

    /// Drop all notifications, read or not
    pub async fn clear_notifications(&self) {
        self.state.write().await.notifications.clear();
    }

    /// Count of unread notifications, recomputed from the list on every
    /// call so it can never drift from the entries themselves
    pub async fn unread_count(&self) -> usize {
        self.state
            .read()
            .await
            .notifications
            .iter()
            .filter(|n| !n.read)
            .count()
    }

    /// Snapshot of all notifications, most recent first
    pub async fn notifications(&self) -> Vec<Notification> {
        self.state.read().await.notifications.iter().cloned().collect()
    }

    /// Snapshot of the recent-updates feed, most recent first
    pub async fn recent_updates(&self) -> Vec<PushFrame> {
        self.state.read().await.recent_updates.iter().cloned().collect()
    }

    /// Feed the store from the bus until cancelled.
    ///
    /// Lifecycle events are ignored here; only frames mutate the store.
    pub async fn run(&self, bus: SharedBus, shutdown: CancellationToken) {
        let mut rx = bus.subscribe();
        info!("Notification store started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Notification store shutting down");
                    break;
                }
                result = rx.recv() => {
                    match result {
                        Ok(ChannelEvent::Frame(frame)) => self.on_frame(&frame).await,
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Notification store lagged behind the bus");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::create_bus;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::timeout;

    fn booking_frame(message: &str) -> PushFrame {
        PushFrame::new(
            EventKind::ReservationCreated,
            json!({ "message": message }),
        )
    }

    #[tokio::test]
    async fn test_qualifying_frame_becomes_unread_notification() {
        let store = NotificationStore::new();

        store.on_frame(&booking_frame("New booking")).await;

        let notifications = store.notifications().await;
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].message, "New booking");
        assert_eq!(notifications[0].kind, EventKind::ReservationCreated);
        assert!(!notifications[0].read);
        assert_eq!(store.unread_count().await, 1);

        store.mark_as_read(notifications[0].id).await;
        assert_eq!(store.unread_count().await, 0);

        // Marking read keeps the entry in place
        let notifications = store.notifications().await;
        assert_eq!(notifications.len(), 1);
        assert!(notifications[0].read);
    }

    #[tokio::test]
    async fn test_frame_without_message_is_not_a_notification() {
        let store = NotificationStore::new();

        store
            .on_frame(&PushFrame::new(
                EventKind::BusinessUpdated,
                json!({ "business_id": 3 }),
            ))
            .await;

        assert!(store.notifications().await.is_empty());
        // But it still lands in the updates feed
        assert_eq!(store.recent_updates().await.len(), 1);
    }

    #[tokio::test]
    async fn test_control_frames_are_ignored_entirely() {
        let store = NotificationStore::new();

        store.on_frame(&PushFrame::ping()).await;
        store
            .on_frame(&PushFrame::new(EventKind::Pong, json!(null)))
            .await;

        assert!(store.notifications().await.is_empty());
        assert!(store.recent_updates().await.is_empty());
    }

    #[tokio::test]
    async fn test_history_is_capped_at_50_newest_first() {
        let store = NotificationStore::new();

        for i in 0..60 {
            store.on_frame(&booking_frame(&format!("booking {i}"))).await;
        }

        let notifications = store.notifications().await;
        assert_eq!(notifications.len(), MAX_NOTIFICATIONS);
        // Most recent first; the oldest 10 were evicted
        assert_eq!(notifications[0].message, "booking 59");
        assert_eq!(notifications[49].message, "booking 10");
        assert_eq!(store.unread_count().await, MAX_NOTIFICATIONS);
        assert_eq!(store.recent_updates().await.len(), MAX_RECENT_UPDATES);

        // Ids stay strictly descending from the front
        assert!(notifications.windows(2).all(|w| w[0].id > w[1].id));
    }

    #[tokio::test]
    async fn test_cap_holds_when_some_entries_are_read() {
        let store = NotificationStore::new();

        for i in 0..50 {
            store.on_frame(&booking_frame(&format!("booking {i}"))).await;
        }
        for notification in store.notifications().await {
            store.mark_as_read(notification.id).await;
        }
        assert_eq!(store.unread_count().await, 0);

        // Read entries are evicted just like unread ones
        store.on_frame(&booking_frame("booking 50")).await;
        let notifications = store.notifications().await;
        assert_eq!(notifications.len(), MAX_NOTIFICATIONS);
        assert_eq!(notifications[0].message, "booking 50");
        assert_eq!(notifications[49].message, "booking 1");
    }

    #[tokio::test]
    async fn test_mark_as_read_unknown_id_is_a_noop() {
        let store = NotificationStore::new();
        store.on_frame(&booking_frame("only one")).await;

        let before = store.notifications().await;
        store.mark_as_read(9999).await;
        let after = store.notifications().await;

        assert_eq!(before, after);
        assert_eq!(store.unread_count().await, 1);
    }

    #[tokio::test]
    async fn test_clear_notifications_empties_the_list() {
        let store = NotificationStore::new();
        for i in 0..5 {
            store.on_frame(&booking_frame(&format!("booking {i}"))).await;
        }

        store.clear_notifications().await;

        assert!(store.notifications().await.is_empty());
        assert_eq!(store.unread_count().await, 0);
    }

    #[tokio::test]
    async fn test_run_feeds_store_from_bus() {
        let bus = create_bus();
        let store = Arc::new(NotificationStore::new());
        let shutdown = CancellationToken::new();

        let run_store = store.clone();
        let run_bus = bus.clone();
        let run_shutdown = shutdown.clone();
        let handle =
            tokio::spawn(async move { run_store.run(run_bus, run_shutdown).await });

        // Give the run loop a moment to subscribe
        tokio::task::yield_now().await;
        bus.publish(ChannelEvent::Connected);
        bus.publish(ChannelEvent::Frame(booking_frame("New booking")));

        timeout(Duration::from_secs(1), async {
            while store.notifications().await.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("store should pick up the frame from the bus");

        assert_eq!(store.unread_count().await, 1);

        shutdown.cancel();
        timeout(Duration::from_secs(1), handle)
            .await
            .expect("run loop should stop on cancel")
            .unwrap();
    }
}
