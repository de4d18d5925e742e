//! WebSocket Relay
//!
//! Every text frame a client sends is rebroadcast to all connected clients,
//! the sender included. Sync events are pushed to every client as JSON text
//! frames.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use super::handlers::AppState;
use crate::sync::SyncEvent;

/// Buffered frames per client before it starts lagging.
const RELAY_BUFFER: usize = 1000;

/// Fan-out point shared by all relay connections.
#[derive(Debug, Clone)]
pub struct RelayHub {
    sender: broadcast::Sender<String>,
}

impl RelayHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(RELAY_BUFFER);
        Self { sender }
    }

    /// Sends a frame to every connected client. Returns how many received it.
    pub fn publish(&self, frame: String) -> usize {
        self.sender.send(frame).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for RelayHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Handler for GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| relay_connection(socket, state))
}

async fn relay_connection(mut socket: WebSocket, state: AppState) {
    let mut frames = state.relay.subscribe();
    let mut events = state.coordinator.subscribe();
    info!(clients = state.relay.client_count(), "relay client connected");

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    debug!(bytes = text.len(), "relaying frame");
                    state.relay.publish(text);
                }
                Some(Ok(Message::Close(_))) | None => break,
                // Ping/pong is answered by axum; binary frames are not relayed.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "relay socket error");
                    break;
                }
            },
            frame = frames.recv() => match frame {
                Ok(text) => {
                    if socket.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "relay client lagging"),
                Err(RecvError::Closed) => break,
            },
            event = events.recv() => match event {
                Ok(event) => {
                    if socket.send(Message::Text(event_frame(&event))).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "relay client missed sync events"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    info!("relay client disconnected");
}

fn event_frame(event: &SyncEvent) -> String {
    serde_json::to_string(event).unwrap_or_else(|e| format!(r#"{{"event":"error","reason":"{}"}}"#, e))
}
