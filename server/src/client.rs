use log::{debug, error, warn};
use shared::ServerPacket;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_tungstenite::tungstenite::Message;

/// Identifier of one accepted WebSocket, unique for the server's lifetime.
pub type ConnectionId = u32;

/// Capacity of each connection's outbound queue. A client that falls this
/// far behind starts losing messages instead of stalling the room.
pub const CLIENT_QUEUE_CAPACITY: usize = 256;

// Outbound half of a client connection
#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    pub connected_at: Instant,
    sender: mpsc::Sender<Message>,
}

impl ClientHandle {
    pub fn new(id: ConnectionId, addr: SocketAddr, sender: mpsc::Sender<Message>) -> Self {
        ClientHandle {
            id,
            addr,
            connected_at: Instant::now(),
            sender,
        }
    }

    // Serialize and queue a packet for this client only
    pub fn send(&self, packet: &ServerPacket) -> bool {
        match packet.to_json() {
            Ok(text) => self.send_text(text),
            Err(e) => {
                error!("Failed to encode packet for connection {}: {}", self.id, e);
                false
            }
        }
    }

    // Queue an already encoded frame. Never blocks; failures stay with this client.
    pub fn send_text(&self, text: String) -> bool {
        match self.sender.try_send(Message::Text(text)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Outbound queue full for connection {} ({}), dropping message",
                    self.id, self.addr
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Connection {} already closed", self.id);
                false
            }
        }
    }

    // Ask the writer task to send a close frame and stop
    pub fn close(&self) {
        if self.sender.try_send(Message::Close(None)).is_err() {
            debug!("Could not queue close frame for connection {}", self.id);
        }
    }

    /// How long ago the WebSocket handshake completed.
    pub fn connected_for(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
