//! Sync channel to the relay server
//!
//! A long-lived WebSocket connection that mirrors start/stop recording
//! commands between the two paired devices. The channel reports what it
//! receives; applying commands to the capture controller is the session
//! layer's job.

use crate::protocol::{RawSyncMessage, SyncCommand, SyncCommandKind};
use duocap_core::{DeviceId, DuocapError};
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Connection states of the sync channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No connection to the relay
    Disconnected,
    /// Connection attempt in flight
    Connecting,
    /// Connected; commands can be sent and received
    Connected,
}

/// Events emitted by the sync channel
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// The relay connection was established
    Connected,
    /// The relay connection ended
    Disconnected {
        /// Why the connection ended
        reason: String,
    },
    /// A recognized command arrived from the relay
    CommandReceived {
        /// The command
        command: SyncCommandKind,
        /// Device tag the peer put in the envelope, if any
        from_device: Option<String>,
        /// Envelope timestamp in unix milliseconds, if any
        timestamp: Option<i64>,
    },
}

/// Bidirectional command channel to the relay server.
///
/// State machine: `Disconnected → Connecting → Connected → Disconnected`,
/// where the last transition is reachable through `disconnect()`, a close
/// from the relay, or a transport failure observed by the reader task.
pub struct SyncChannel {
    device: DeviceId,
    state: Arc<Mutex<SyncState>>,
    sink: Arc<tokio::sync::Mutex<Option<WsSink>>>,
    reader: Mutex<Option<tokio::task::JoinHandle<()>>>,
    event_tx: broadcast::Sender<SyncEvent>,
}

impl std::fmt::Debug for SyncChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncChannel")
            .field("device", &self.device)
            .field("state", &self.state())
            .finish()
    }
}

impl SyncChannel {
    /// Create a channel for `device`; no connection is opened yet
    pub fn new(device: DeviceId) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            device,
            state: Arc::new(Mutex::new(SyncState::Disconnected)),
            sink: Arc::new(tokio::sync::Mutex::new(None)),
            reader: Mutex::new(None),
            event_tx,
        }
    }

    /// Subscribe to channel events
    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    /// Current connection state
    pub fn state(&self) -> SyncState {
        *self.state.lock()
    }

    /// Whether commands can currently be sent
    pub fn is_connected(&self) -> bool {
        self.state() == SyncState::Connected
    }

    /// Open the relay connection at `relay_url` (e.g. `ws://host:port`).
    ///
    /// The device identity is appended as the `/ws/{device_id}` path. On
    /// failure the channel is back in `Disconnected` and the error is
    /// returned for the caller to surface.
    pub async fn connect(&self, relay_url: &str) -> Result<(), DuocapError> {
        {
            let mut state = self.state.lock();
            match *state {
                SyncState::Disconnected => *state = SyncState::Connecting,
                other => {
                    debug!("connect requested while {:?}, ignoring", other);
                    return Ok(());
                }
            }
        }

        let url = format!("{}/ws/{}", relay_url.trim_end_matches('/'), self.device);
        let connection_id = Uuid::new_v4();
        info!("[{}] connecting to relay {} ({})", self.device, url, connection_id);

        let (ws, _response) = match connect_async(&url).await {
            Ok(ok) => ok,
            Err(err) => {
                *self.state.lock() = SyncState::Disconnected;
                return Err(DuocapError::Connection {
                    url,
                    reason: err.to_string(),
                });
            }
        };

        let (sink, stream) = ws.split();
        *self.sink.lock().await = Some(sink);
        *self.state.lock() = SyncState::Connected;

        let reader = tokio::spawn(Self::read_loop(
            stream,
            Arc::clone(&self.state),
            self.event_tx.clone(),
        ));
        *self.reader.lock() = Some(reader);

        info!("[{}] sync connected ({})", self.device, connection_id);
        let _ = self.event_tx.send(SyncEvent::Connected);
        Ok(())
    }

    /// Send a command to the relay.
    ///
    /// Valid only while `Connected`. A transmission failure is reported to
    /// the caller but does not itself change the connection state; the
    /// reader task signals disconnection separately.
    pub async fn send(&self, command: SyncCommandKind) -> Result<(), DuocapError> {
        let state = self.state();
        if state != SyncState::Connected {
            return Err(DuocapError::InvalidState {
                expected: "Connected".to_string(),
                actual: format!("{:?}", state),
            });
        }

        let envelope = SyncCommand::now(command, self.device);
        let json = serde_json::to_string(&envelope).map_err(|err| DuocapError::InvalidData {
            reason: err.to_string(),
        })?;

        let mut sink = self.sink.lock().await;
        let sink = sink.as_mut().ok_or_else(|| DuocapError::InvalidState {
            expected: "Connected".to_string(),
            actual: "Disconnected".to_string(),
        })?;
        debug!("[{}] sync command send: {}", self.device, json);
        sink.send(Message::Text(json))
            .await
            .map_err(|err| DuocapError::SyncSend {
                reason: err.to_string(),
            })
    }

    /// Close the relay connection. Idempotent; safe to call when already
    /// disconnected.
    pub async fn disconnect(&self) {
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        if let Some(mut sink) = self.sink.lock().await.take() {
            let close = Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "user disconnected".into(),
            }));
            if let Err(err) = sink.send(close).await {
                debug!("close frame not delivered: {}", err);
            }
        }

        let was_connected = {
            let mut state = self.state.lock();
            let was = *state != SyncState::Disconnected;
            *state = SyncState::Disconnected;
            was
        };
        if was_connected {
            info!("[{}] sync disconnected", self.device);
            let _ = self.event_tx.send(SyncEvent::Disconnected {
                reason: "user disconnected".to_string(),
            });
        }
    }

    async fn read_loop(
        mut stream: futures::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
        state: Arc<Mutex<SyncState>>,
        event_tx: broadcast::Sender<SyncEvent>,
    ) {
        let reason = loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    Self::handle_frame(&text, &state, &event_tx);
                }
                Some(Ok(Message::Close(frame))) => {
                    break match frame {
                        Some(frame) => format!("closed by relay: {}", frame.reason),
                        None => "closed by relay".to_string(),
                    };
                }
                Some(Ok(other)) => {
                    debug!("ignoring non-text frame: {:?}", other);
                }
                Some(Err(err)) => break format!("transport error: {}", err),
                None => break "stream ended".to_string(),
            }
        };

        *state.lock() = SyncState::Disconnected;
        warn!("sync connection lost: {}", reason);
        let _ = event_tx.send(SyncEvent::Disconnected { reason });
    }

    fn handle_frame(
        text: &str,
        state: &Arc<Mutex<SyncState>>,
        event_tx: &broadcast::Sender<SyncEvent>,
    ) {
        let raw: RawSyncMessage = match serde_json::from_str(text) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("malformed sync message {:?}: {}", text, err);
                return;
            }
        };

        // A command should only ever arrive while connected; if one slips
        // through during teardown it is dropped, not acted on.
        if *state.lock() != SyncState::Connected {
            debug!("command {:?} received while not connected, ignoring", raw.command);
            return;
        }

        match raw.kind() {
            Some(command) => {
                debug!(
                    "sync command received: {} from {:?}",
                    command.as_str(),
                    raw.device_id
                );
                let _ = event_tx.send(SyncEvent::CommandReceived {
                    command,
                    from_device: raw.device_id,
                    timestamp: raw.timestamp,
                });
            }
            None => {
                warn!("unknown sync command: {}", raw.command);
            }
        }
    }
}
