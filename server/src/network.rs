//! Server network layer handling WebSocket connections and game loop coordination

use crate::client::{ClientHandle, ConnectionId, CLIENT_QUEUE_CAPACITY};
use crate::session::{Session, SessionState};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientPacket, MatchConfig};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    ClientConnected {
        client: ClientHandle,
    },
    PacketReceived {
        packet: ClientPacket,
        conn: ConnectionId,
    },
    ClientDisconnected {
        conn: ConnectionId,
    },
    Shutdown,
}

/// Main server owning the room and the socket it is reachable on
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    session: Session,
    tick_duration: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        config: MatchConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on ws://{}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            session: Session::new(config),
            tick_duration,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Sender that lets other tasks inject messages, e.g. `Shutdown`
    pub fn handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that accepts sockets and hands each one its own tasks
    fn spawn_listener(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut next_conn: ConnectionId = 1;

            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let conn = next_conn;
                        next_conn += 1;
                        tokio::spawn(handle_connection(stream, addr, conn, server_tx.clone()));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }

                if server_tx.is_closed() {
                    break;
                }
            }
        });
    }

    /// Applies one event to the room. Returns false once the server should stop.
    fn handle_message(&mut self, message: ServerMessage) -> bool {
        match message {
            ServerMessage::ClientConnected { client } => {
                let conn = client.id;
                if let Err(e) = self.session.join(client) {
                    debug!("Connection {} not admitted: {}", conn, e);
                }
            }
            ServerMessage::PacketReceived { packet, conn } => {
                self.session.handle_packet(conn, packet);
            }
            ServerMessage::ClientDisconnected { conn } => {
                self.session.leave(conn);
            }
            ServerMessage::Shutdown => {
                info!("Server shutting down");
                self.session.reset();
                return false;
            }
        }
        true
    }

    /// Main server loop. Inbound events and ticks are handled one at a time,
    /// so the session never sees concurrent mutation.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_listener();

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle connection events
                message = self.server_rx.recv() => {
                    match message {
                        Some(message) => {
                            if !self.handle_message(message) {
                                break;
                            }
                        }
                        None => break,
                    }
                },

                // Drive the simulation only while a match is running
                _ = tick_interval.tick(), if self.session.is_ticking() => {
                    self.session.on_tick(Instant::now());

                    let tick = self.session.tick_count();
                    if tick % 60 == 0 && self.session.state() == SessionState::Active {
                        let alive = self.session.players().filter(|p| p.alive).count();
                        debug!("Tick {}: {} players, {} alive", tick, self.session.len(), alive);
                    }
                },
            }
        }

        Ok(())
    }
}

/// Performs the WebSocket handshake, then pumps frames in both directions
/// until either side goes away.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    conn: ConnectionId,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };
    debug!("Connection {} opened from {}", conn, addr);

    let (mut write, mut read) = ws_stream.split();
    let (tx, mut rx) = mpsc::channel::<Message>(CLIENT_QUEUE_CAPACITY);

    let client = ClientHandle::new(conn, addr, tx);
    if server_tx
        .send(ServerMessage::ClientConnected { client })
        .is_err()
    {
        return;
    }

    // Writer: ends on a close frame, a send error, or once the session drops the handle
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if let Err(e) = write.send(message).await {
                debug!("Send to connection {} failed: {}", conn, e);
                break;
            }
            if closing {
                break;
            }
        }
        let _ = write.close().await;
    });

    while let Some(frame) = read.next().await {
        match frame {
            Ok(Message::Text(text)) => match ClientPacket::from_json(&text) {
                Ok(packet) => {
                    if server_tx
                        .send(ServerMessage::PacketReceived { packet, conn })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => warn!("Dropping malformed packet from connection {}: {}", conn, e),
            },
            Ok(Message::Binary(_)) => {
                warn!("Ignoring binary frame from connection {}", conn);
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Connection {} read error: {}", conn, e);
                break;
            }
        }
    }

    debug!("Connection {} closed", conn);
    let _ = server_tx.send(ServerMessage::ClientDisconnected { conn });
}
