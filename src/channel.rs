//! Dashboard push channel with fixed-interval reconnect.
//!
//! One `PushChannel` owns one logical WebSocket connection to the
//! backend's dashboard endpoint. Dropped connections are retried forever
//! at a constant interval until `disconnect()` tears the channel down;
//! there is deliberately no backoff growth and no retry cap, and an
//! auth-rejected close retries exactly like a network blip.
//!
//! Decoded frames and lifecycle transitions are published on the shared
//! bus; nothing here blocks the caller.

use crate::bus::{ChannelEvent, SharedBus};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reserva_events::PushFrame;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Delay between a detected disconnect and the next attempt
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(3000);

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("invalid push endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("channel is already running")]
    AlreadyRunning,
}

/// Connection lifecycle state as observed from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    Reconnecting,
}

/// Channel status snapshot for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelStatus {
    pub endpoint: String,
    pub state: ConnectionState,
    pub reconnect_interval_ms: u64,
}

/// Credential source consulted fresh on every (re)connect attempt.
///
/// The token is never cached across attempts, so a rotated credential is
/// picked up by the next reconnect without restarting the channel. If
/// the source keeps returning a credential the server rejects, the
/// channel will retry with it forever.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn token(&self) -> Option<String>;
}

/// Fixed token, typically read from configuration at startup.
pub struct StaticCredentials {
    token: Option<String>,
}

impl StaticCredentials {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn token(&self) -> Option<String> {
        self.token.clone()
    }
}

/// Internal state shared with the run loop
struct ChannelState {
    state: ConnectionState,
    running: bool,
    /// Writer handle for the currently open socket, if any
    outbound: Option<mpsc::UnboundedSender<Message>>,
}

/// Best-effort persistent connection to one dashboard push endpoint.
pub struct PushChannel {
    endpoint: String,
    reconnect_interval: Duration,
    credentials: Arc<dyn CredentialProvider>,
    bus: SharedBus,
    state: Arc<RwLock<ChannelState>>,
    /// Wrapped in RwLock to allow creating a fresh token on reconnect-after-disconnect
    shutdown: Arc<RwLock<CancellationToken>>,
}

impl PushChannel {
    pub fn new(
        endpoint: impl Into<String>,
        reconnect_interval: Duration,
        credentials: Arc<dyn CredentialProvider>,
        bus: SharedBus,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            reconnect_interval,
            credentials,
            bus,
            state: Arc::new(RwLock::new(ChannelState {
                state: ConnectionState::Closed,
                running: false,
                outbound: None,
            })),
            shutdown: Arc::new(RwLock::new(CancellationToken::new())),
        }
    }

    /// Start the channel: connect, read frames, reconnect on drops.
    ///
    /// Returns once the run loop is spawned. At most one run loop exists
    /// per channel; a second `connect()` while running is an error.
    pub async fn connect(&self) -> Result<(), ChannelError> {
        // Fail early on endpoints that can never connect
        Url::parse(&self.endpoint)?;

        {
            let mut state = self.state.write().await;
            if state.running {
                return Err(ChannelError::AlreadyRunning);
            }
            state.running = true;
            state.state = ConnectionState::Connecting;
        }

        // Fresh cancellation token for this run (previous token may be cancelled)
        let shutdown = {
            let mut token = self.shutdown.write().await;
            *token = CancellationToken::new();
            token.clone()
        };

        tokio::spawn(run_loop(
            self.endpoint.clone(),
            self.reconnect_interval,
            self.credentials.clone(),
            self.bus.clone(),
            self.state.clone(),
            shutdown,
        ));

        Ok(())
    }

    /// Tear the channel down: close an open socket and cancel any pending
    /// reconnect. No further attempts happen until `connect()` again.
    pub async fn disconnect(&self) {
        self.shutdown.read().await.cancel();

        let mut state = self.state.write().await;
        state.running = false;
        state.state = ConnectionState::Closed;
        state.outbound = None;
    }

    /// Send structured data as a JSON text frame.
    ///
    /// Only transmits while the channel is open. Anything else is logged
    /// and dropped - messages are never queued across disconnects and
    /// callers never see an error.
    pub async fn send<T: Serialize>(&self, data: &T) {
        let state = self.state.read().await;
        if state.state != ConnectionState::Open {
            warn!("Push channel is not connected; dropping outbound message");
            return;
        }
        let Some(tx) = state.outbound.as_ref() else {
            warn!("Push channel has no writer; dropping outbound message");
            return;
        };
        match serde_json::to_string(data) {
            Ok(text) => {
                if tx.send(Message::text(text)).is_err() {
                    warn!("Push channel writer is gone; dropping outbound message");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize outbound message"),
        }
    }

    /// Current connection state
    pub async fn connection_state(&self) -> ConnectionState {
        self.state.read().await.state
    }

    /// Status snapshot for diagnostics
    pub async fn get_status(&self) -> ChannelStatus {
        ChannelStatus {
            endpoint: self.endpoint.clone(),
            state: self.state.read().await.state,
            reconnect_interval_ms: self.reconnect_interval.as_millis() as u64,
        }
    }
}

/// Append the credential as a query parameter, matching the handshake
/// shape the backend expects (`.../ws/dashboard/?token=...`).
fn connect_url(endpoint: &str, token: Option<&str>) -> String {
    match token {
        Some(token) => {
            let sep = if endpoint.contains('?') { '&' } else { '?' };
            format!("{endpoint}{sep}token={}", urlencoding::encode(token))
        }
        None => endpoint.to_string(),
    }
}

/// Connect / read / reconnect loop. Exits only on cancellation.
///
/// The loop structure is what guarantees "exactly one pending reconnect
/// per close": the next attempt is the next loop iteration, never a
/// separately scheduled timer that could double up.
async fn run_loop(
    endpoint: String,
    reconnect_interval: Duration,
    credentials: Arc<dyn CredentialProvider>,
    bus: SharedBus,
    state: Arc<RwLock<ChannelState>>,
    shutdown: CancellationToken,
) {
    loop {
        // Read the credential fresh for every attempt
        let token = credentials.token().await;
        let url = connect_url(&endpoint, token.as_deref());

        let attempt = tokio::select! {
            _ = shutdown.cancelled() => return,
            result = connect_async(url.as_str()) => result,
        };

        match attempt {
            Ok((ws, _response)) => {
                info!(endpoint = %endpoint, "Push channel connected");
                state.write().await.state = ConnectionState::Open;
                bus.publish(ChannelEvent::Connected);

                serve_connection(ws, &bus, &state, &shutdown).await;

                {
                    let mut state = state.write().await;
                    state.state = ConnectionState::Closed;
                    state.outbound = None;
                }
                info!(endpoint = %endpoint, "Push channel disconnected");
                bus.publish(ChannelEvent::Disconnected);
            }
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "Push channel connection failed");
                state.write().await.state = ConnectionState::Closed;
                bus.publish(ChannelEvent::Disconnected);
            }
        }

        if shutdown.is_cancelled() {
            return;
        }

        state.write().await.state = ConnectionState::Reconnecting;
        debug!(
            delay_ms = reconnect_interval.as_millis() as u64,
            "Scheduling reconnect"
        );
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(reconnect_interval) => {}
        }
    }
}

/// Pump one open socket until it closes, errs, or the channel is torn down.
async fn serve_connection(
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    bus: &SharedBus,
    state: &Arc<RwLock<ChannelState>>,
    shutdown: &CancellationToken,
) {
    let (mut write, mut read) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    state.write().await.outbound = Some(tx);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            Some(outgoing) = rx.recv() => {
                if let Err(e) = write.send(outgoing).await {
                    warn!(error = %e, "Push channel write failed");
                    break;
                }
            }
            incoming = read.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => handle_frame(text.as_str(), bus),
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "Server closed the push channel");
                        break;
                    }
                    // Transport-level frames; tungstenite answers pings itself
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Push channel read failed");
                        break;
                    }
                    None => break,
                }
            }
        }
    }
}

/// Decode one inbound text frame and fan it out.
///
/// The backend does no schema validation, so a malformed frame is a
/// reportable condition here: log it loudly and drop it, never crash the
/// handler chain.
fn handle_frame(text: &str, bus: &SharedBus) {
    match serde_json::from_str::<PushFrame>(text) {
        Ok(frame) => {
            debug!(kind = %frame.kind, "Push frame received");
            bus.publish(ChannelEvent::Frame(frame));
        }
        Err(e) => {
            warn!(error = %e, frame = text, "Dropping malformed push frame");
        }
    }
}
