//! Reserva dashboard listener
//!
//! Connects to the dashboard push channel, keeps the notification store
//! current, and logs each notification until interrupted.

use anyhow::Result;
use reserva_push::bus::{create_bus, ChannelEvent};
use reserva_push::channel::{PushChannel, StaticCredentials};
use reserva_push::config;
use reserva_push::notifications::NotificationStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reserva_push=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Reserva dashboard listener");

    // Load configuration
    let config = config::load_config()?;
    tracing::info!(endpoint = %config.endpoint, "Configuration loaded");

    let bus = create_bus();
    let store = Arc::new(NotificationStore::new());
    let shutdown = CancellationToken::new();

    // Keep the store current from the bus
    {
        let store = store.clone();
        let bus = bus.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { store.run(bus, shutdown).await });
    }

    let channel = PushChannel::new(
        &config.endpoint,
        Duration::from_millis(config.reconnect_interval_ms),
        Arc::new(StaticCredentials::new(config.token.clone())),
        bus.clone(),
    );
    channel.connect().await?;

    // Log notifications as they land, until ctrl-c
    let mut rx = bus.subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            result = rx.recv() => {
                if let Ok(ChannelEvent::Frame(frame)) = result {
                    if let Some(text) = frame.notification_message() {
                        let unread = store.unread_count().await;
                        tracing::info!(kind = %frame.kind, unread, "{text}");
                    }
                }
            }
        }
    }

    tracing::info!("Shutting down");
    channel.disconnect().await;
    shutdown.cancel();

    Ok(())
}
