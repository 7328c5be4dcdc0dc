//! Server network layer handling UDP communications and session relay
//!
//! Mirrors the session table onto the wire: datagrams come in through a
//! receiver task, the single-threaded main loop mutates the session table
//! (which serializes tick and move handling per session by construction),
//! and outbound packets leave through a sender task. Malformed datagrams
//! are dropped; nothing here is fatal to the process.

use crate::clients::ClientRegistry;
use crate::session::{DisconnectOutcome, MoveOutcome, PairOutcome, SessionTable};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{MoveIntent, Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: u32,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from the main loop to the network sender task
#[derive(Debug)]
pub enum RelayMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
}

/// Main server coordinating networking, pairing, and simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientRegistry>>,
    sessions: SessionTable,
    tick_duration: Duration,
    tick: u32,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    relay_tx: mpsc::UnboundedSender<RelayMessage>,
    relay_rx: mpsc::UnboundedReceiver<RelayMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_clients: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (relay_tx, relay_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientRegistry::new(max_clients))),
            sessions: SessionTable::new(),
            tick_duration,
            tick: 0,
            server_tx,
            server_rx,
            relay_tx,
            relay_rx,
        })
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 4096];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes the outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut relay_rx = std::mem::replace(&mut self.relay_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = relay_rx.recv().await {
                match message {
                    RelayMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    async fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    /// Queues a packet for the sender task. Delivery is best-effort.
    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.relay_tx.send(RelayMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    async fn client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients.read().await.find_by_addr(addr)
    }

    /// Sends the session's full state snapshot to both members.
    async fn broadcast_session_state(&self, session_id: u64) {
        let (packet, members) = match self.sessions.session(session_id) {
            Some(session) => (session.state_packet(), session.players()),
            None => return,
        };

        let clients = self.clients.read().await;
        for member in members {
            if let Some(addr) = clients.addr_of(member) {
                self.send_packet(packet.clone(), addr);
            }
        }
    }

    async fn send_to_client(&self, client_id: u32, packet: Packet) {
        let addr = { self.clients.read().await.addr_of(client_id) };
        if let Some(addr) = addr {
            self.send_packet(packet, addr);
        }
    }

    /// Processes one inbound packet against the registry and session table
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Join { client_version } => {
                self.handle_join(client_version, addr).await;
            }
            Packet::Move { intent } => {
                self.handle_move(intent, addr).await;
            }
            Packet::Restart => {
                self.handle_restart(addr).await;
            }
            Packet::Heartbeat { .. } => {
                if let Some(client_id) = self.client_by_addr(addr).await {
                    self.clients.write().await.touch(client_id);
                }
            }
            Packet::Leave => {
                self.handle_leave(addr).await;
            }
            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    async fn handle_join(&mut self, client_version: u32, addr: SocketAddr) {
        if client_version != PROTOCOL_VERSION {
            warn!(
                "Client at {} has protocol version {}, expected {}",
                addr, client_version, PROTOCOL_VERSION
            );
            self.send_packet(
                Packet::Error {
                    message: "protocol version mismatch".to_string(),
                },
                addr,
            );
            return;
        }

        // Reuse the existing registration for a known address.
        let client_id = match self.client_by_addr(addr).await {
            Some(existing) => {
                self.clients.write().await.touch(existing);
                existing
            }
            None => match self.clients.write().await.register(addr) {
                Some(new_id) => new_id,
                None => {
                    self.send_packet(
                        Packet::Error {
                            message: "server full".to_string(),
                        },
                        addr,
                    );
                    return;
                }
            },
        };

        match self.sessions.pair_waiting(client_id) {
            Ok(PairOutcome::Waiting) => {
                self.send_packet(Packet::Waiting, addr);
            }
            Ok(PairOutcome::Paired { session_id }) => {
                let members = self.sessions.session(session_id).map(|s| s.players());
                if let Some(members) = members {
                    for (seat, member) in members.into_iter().enumerate() {
                        self.send_to_client(member, Packet::Start { session_id, seat })
                            .await;
                    }
                }
                self.broadcast_session_state(session_id).await;
            }
            Err(e) => {
                debug!("Join from client {} refused: {}", client_id, e);
                self.send_packet(
                    Packet::Error {
                        message: e.to_string(),
                    },
                    addr,
                );
            }
        }
    }

    async fn handle_move(&mut self, intent: MoveIntent, addr: SocketAddr) {
        let client_id = match self.client_by_addr(addr).await {
            Some(client_id) => client_id,
            None => {
                debug!("Move from unregistered address {}", addr);
                return;
            }
        };
        self.clients.write().await.touch(client_id);

        match self.sessions.submit_move(client_id, intent) {
            MoveOutcome::Updated { opponent, intent, .. } => {
                self.send_to_client(opponent, Packet::OpponentMove { intent })
                    .await;
            }
            MoveOutcome::Committed { session_id } => {
                self.broadcast_session_state(session_id).await;
            }
            MoveOutcome::Rejected { reason } => {
                debug!("Move from client {} rejected: {}", client_id, reason);
                self.send_packet(
                    Packet::MoveRejected {
                        reason: reason.to_string(),
                    },
                    addr,
                );
            }
            MoveOutcome::NotInSession => {
                self.send_packet(
                    Packet::Error {
                        message: "not in a game".to_string(),
                    },
                    addr,
                );
            }
        }
    }

    async fn handle_restart(&mut self, addr: SocketAddr) {
        let client_id = match self.client_by_addr(addr).await {
            Some(client_id) => client_id,
            None => return,
        };
        self.clients.write().await.touch(client_id);

        match self.sessions.restart(client_id) {
            Ok(session_id) => {
                self.broadcast_session_state(session_id).await;
            }
            Err(e) => {
                self.send_packet(
                    Packet::Error {
                        message: e.to_string(),
                    },
                    addr,
                );
            }
        }
    }

    async fn handle_leave(&mut self, addr: SocketAddr) {
        let client_id = match self.client_by_addr(addr).await {
            Some(client_id) => client_id,
            None => return,
        };

        self.clients.write().await.remove(client_id);
        self.drop_from_sessions(client_id).await;
    }

    /// Removes a departed client from the session table and tells the
    /// survivor their opponent is gone.
    async fn drop_from_sessions(&mut self, client_id: u32) {
        match self.sessions.on_disconnect(client_id) {
            Some(DisconnectOutcome::SessionEnded { remaining, .. }) => {
                self.send_to_client(remaining, Packet::OpponentLeft).await;
            }
            Some(DisconnectOutcome::WasWaiting) | None => {}
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        let mut tick_interval = interval(self.tick_duration);
        let mut last_tick = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            info!("Client {} timed out", client_id);
                            self.drop_from_sessions(client_id).await;
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Advance every running simulation
                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;
                    self.tick = self.tick.wrapping_add(1);

                    let updates = self.sessions.tick(dt);
                    for update in &updates {
                        for event in &update.events {
                            debug!("Session {}: {:?}", update.session_id, event);
                        }
                        self.broadcast_session_state(update.session_id).await;
                    }

                    // Periodic liveness monitoring
                    if self.tick % 300 == 0 {
                        let client_count = { self.clients.read().await.len() };
                        if client_count > 0 {
                            debug!(
                                "Tick {}: {} clients, {} sessions",
                                self.tick,
                                client_count,
                                self.sessions.len()
                            );
                        }
                    }
                },
            }
        }

        Ok(())
    }
}
