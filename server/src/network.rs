//! Session gateway: UDP transport, client sessions and request routing
//!
//! The gateway owns the socket and the session table. Every decoded packet
//! funnels through one loop that resolves the sender to a client and then
//! forwards the request to that client's room. Rooms run in their own tasks
//! (see [`crate::room_task`]) and push their output straight to the sender
//! task, so a slow room never holds up the gateway.

use crate::client_manager::{Client, ClientManager};
use crate::config::ServerConfig;
use crate::error::{GameError, NetError};
use crate::room::Room;
use crate::room_task::{spawn_room, RoomHandle};
use bincode::{deserialize, serialize, serialized_size};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    ClientId, EntityId, JoinRequest, Packet, RoomId, RoomInfo, Snapshot, MAX_DATAGRAM_SIZE,
    PROTOCOL_VERSION,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;

/// Messages sent from network tasks and rooms to the gateway loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    /// The client was already dropped from the session table
    ClientTimeout {
        client: Client,
    },
    PlayerEliminated {
        client_id: ClientId,
        room_id: RoomId,
        entity_id: EntityId,
    },
    Shutdown,
}

/// Messages sent to the network sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    /// One packet to a fixed set of addresses, encoded once
    Multicast {
        packet: Packet,
        addrs: Vec<SocketAddr>,
    },
    /// One packet to every connected client
    BroadcastPacket {
        packet: Packet,
        exclude: Option<ClientId>,
    },
}

/// Encodes a packet, rejecting anything that would not fit in one datagram.
pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>, NetError> {
    let data = serialize(packet)?;
    if data.len() > MAX_DATAGRAM_SIZE {
        return Err(NetError::Oversized(data.len()));
    }
    Ok(data)
}

/// Bytes the `GameState` variant tag adds in front of a snapshot
const GAME_STATE_TAG_SIZE: usize = 4;

fn encoded_len<T: Serialize>(value: &T) -> usize {
    serialized_size(value).map(|len| len as usize).unwrap_or(0)
}

/// Trims a snapshot until its `GameState` packet fits in one datagram.
///
/// Skins go first, then flags, then entries from the tail of the food, bot
/// and player lists. The leaderboard is always kept whole.
pub fn fit_snapshot(mut snapshot: Snapshot) -> Snapshot {
    let budget = MAX_DATAGRAM_SIZE - GAME_STATE_TAG_SIZE;
    let original = encoded_len(&snapshot);
    let mut size = original;
    if size <= budget {
        return snapshot;
    }

    for player in snapshot.players.iter_mut() {
        if size <= budget {
            break;
        }
        if let Some(skin) = player.skin.take() {
            size = size.saturating_sub(encoded_len(&skin));
        }
    }
    for player in snapshot.players.iter_mut() {
        if size <= budget {
            break;
        }
        if let Some(flag) = player.flag.take() {
            size = size.saturating_sub(encoded_len(&flag));
        }
    }
    while size > budget {
        let removed = if let Some(food) = snapshot.foods.pop() {
            encoded_len(&food)
        } else if let Some(bot) = snapshot.bots.pop() {
            encoded_len(&bot)
        } else if let Some(player) = snapshot.players.pop() {
            encoded_len(&player)
        } else {
            break;
        };
        size = size.saturating_sub(removed);
    }

    warn!(
        "Trimmed snapshot for room {} from {} to {} bytes",
        snapshot.room_id, original, size
    );
    snapshot
}

/// Main server coordinating sessions and rooms
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    config: ServerConfig,
    rooms: BTreeMap<RoomId, RoomHandle>,
    tasks: Vec<JoinHandle<()>>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, NetError> {
        let socket = Arc::new(UdpSocket::bind(&config.bind_addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(config.max_clients))),
            config,
            rooms: BTreeMap::new(),
            tasks: Vec::new(),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        Ok(self.socket.local_addr()?)
    }

    /// Sender that stops the server when given [`ServerMessage::Shutdown`]
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Creates and starts every configured room
    fn spawn_rooms(&mut self) {
        for room_config in &self.config.rooms {
            let rng = match self.config.seed {
                Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(room_config.id as u64)),
                None => StdRng::from_entropy(),
            };
            let room = Room::new(room_config.clone(), self.config.world, rng);
            let (handle, task) = spawn_room(
                room,
                self.config.tick_duration,
                self.game_tx.clone(),
                self.server_tx.clone(),
            );
            self.rooms.insert(handle.id(), handle);
            self.tasks.push(task);
        }
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match deserialize::<Packet>(&buffer[0..len]) {
                        Ok(packet) => {
                            if let Err(e) = server_tx.send(ServerMessage::PacketReceived { packet, addr }) {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Failed to deserialize packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        })
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_to_all(&socket, &packet, &[addr]).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::Multicast { packet, addrs } => {
                        if let Err(e) = Self::send_to_all(&socket, &packet, &addrs).await {
                            error!("Failed to multicast packet: {}", e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let addrs: Vec<SocketAddr> = {
                            let clients_guard = clients.read().await;
                            clients_guard
                                .get_client_addrs()
                                .into_iter()
                                .filter(|(client_id, _)| Some(*client_id) != exclude)
                                .map(|(_, addr)| addr)
                                .collect()
                        };

                        if let Err(e) = Self::send_to_all(&socket, &packet, &addrs).await {
                            error!("Failed to broadcast packet: {}", e);
                        }
                    }
                }
            }
        })
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) -> JoinHandle<()> {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();
        let timeout = self.config.client_timeout;

        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts(timeout)
                };

                for client in timed_out {
                    info!("Client {} timed out", client.id);
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        })
    }

    /// Encodes once and sends to each address. A failed address does not
    /// stop delivery to the rest.
    async fn send_to_all(socket: &UdpSocket, packet: &Packet, addrs: &[SocketAddr]) -> Result<(), NetError> {
        let data = encode_packet(packet)?;
        for addr in addrs {
            if let Err(e) = socket.send_to(&data, *addr).await {
                debug!("Send to {} failed: {}", addr, e);
            }
        }
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet, exclude: Option<ClientId>) {
        if let Err(e) = self.game_tx.send(GameMessage::BroadcastPacket { packet, exclude }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    async fn player_counts(&self) -> BTreeMap<RoomId, u32> {
        let clients = self.clients.read().await;
        clients.room_counts(self.rooms.keys().copied())
    }

    /// Pushes the current per-room player counts to every connected client
    async fn broadcast_player_counts(&self) {
        let counts = self.player_counts().await;
        self.broadcast_packet(Packet::PlayerCountUpdate { counts }, None);
    }

    async fn room_list(&self) -> Vec<RoomInfo> {
        let counts = self.player_counts().await;
        self.rooms
            .values()
            .map(|room| room.config().info(counts.get(&room.id()).copied().unwrap_or(0)))
            .collect()
    }

    /// Processes incoming packets and routes them to rooms
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        if let Packet::Connect { client_version } = packet {
            self.handle_connect(client_version, addr).await;
            return;
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            let client_id = clients.find_client_by_addr(addr);
            if let Some(client_id) = client_id {
                clients.touch(client_id);
            }
            client_id
        };

        let client_id = match client_id {
            Some(client_id) => client_id,
            None => {
                warn!("Ignoring packet from unknown address {}", addr);
                return;
            }
        };

        match packet {
            Packet::ListRooms => {
                let rooms = self.room_list().await;
                self.send_packet(Packet::RoomList { rooms }, addr);
            }

            Packet::Join { room_id, request } => {
                self.handle_join(client_id, room_id, request, addr).await;
            }

            Packet::Move { intent } => {
                if let Some(room) = self.room_of(client_id).await {
                    Self::report(room.set_intent(client_id, intent));
                }
            }

            Packet::Chat { text } => {
                if let Some(room) = self.room_of(client_id).await {
                    Self::report(room.chat(client_id, text));
                }
            }

            Packet::UpdatePlayer { update } => {
                if let Some(room) = self.room_of(client_id).await {
                    Self::report(room.update_player(client_id, update));
                }
            }

            Packet::Leave => {
                if self.leave_room(client_id).await {
                    self.broadcast_player_counts().await;
                }
            }

            Packet::Heartbeat => {}

            Packet::Disconnect => {
                self.disconnect(client_id).await;
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    async fn handle_connect(&mut self, client_version: u32, addr: SocketAddr) {
        info!("Client connecting from {} (version: {})", addr, client_version);

        if client_version != PROTOCOL_VERSION {
            self.send_packet(
                Packet::Disconnected {
                    reason: "Protocol version mismatch".to_string(),
                },
                addr,
            );
            return;
        }

        // Remove existing connection if present
        let existing_client_id = {
            let clients = self.clients.read().await;
            clients.find_client_by_addr(addr)
        };
        if let Some(existing_id) = existing_client_id {
            info!("Removing existing client {} from {}", existing_id, addr);
            self.disconnect(existing_id).await;
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            clients.add_client(addr)
        };

        let response = match client_id {
            Some(client_id) => Packet::Connected { client_id },
            None => Packet::Disconnected {
                reason: "Server full".to_string(),
            },
        };
        self.send_packet(response, addr);
    }

    async fn handle_join(&mut self, client_id: ClientId, room_id: RoomId, request: JoinRequest, addr: SocketAddr) {
        let room = match self.rooms.get(&room_id) {
            Some(room) => room.clone(),
            None => {
                self.send_packet(
                    Packet::Error {
                        reason: GameError::RoomNotFound(room_id).to_string(),
                    },
                    addr,
                );
                return;
            }
        };

        // A client plays in one room at a time
        let left = self.leave_room(client_id).await;

        match room.join(client_id, addr, request).await {
            Ok(entity_id) => {
                let recorded = {
                    let mut clients = self.clients.write().await;
                    clients.set_membership(client_id, room_id, entity_id)
                };
                if recorded {
                    info!("Client {} joined room {} as player {}", client_id, room_id, entity_id);
                } else {
                    // Session vanished while the room was answering
                    Self::report(room.leave(client_id));
                }
                self.broadcast_player_counts().await;
            }
            Err(e) => {
                warn!("Client {} could not join room {}: {}", client_id, room_id, e);
                self.send_packet(Packet::Error { reason: e.to_string() }, addr);
                if left {
                    self.broadcast_player_counts().await;
                }
            }
        }
    }

    async fn room_of(&self, client_id: ClientId) -> Option<&RoomHandle> {
        let room_id = {
            let clients = self.clients.read().await;
            clients.room_of(client_id)
        };
        room_id.and_then(|id| self.rooms.get(&id))
    }

    /// Takes the client out of its room. Returns true if it was in one.
    async fn leave_room(&mut self, client_id: ClientId) -> bool {
        let membership = {
            let mut clients = self.clients.write().await;
            clients.clear_membership(client_id)
        };

        match membership {
            Some((room_id, _)) => {
                if let Some(room) = self.rooms.get(&room_id) {
                    Self::report(room.leave(client_id));
                }
                true
            }
            None => false,
        }
    }

    async fn disconnect(&mut self, client_id: ClientId) {
        let was_playing = self.leave_room(client_id).await;
        {
            let mut clients = self.clients.write().await;
            clients.remove_client(client_id);
        }
        if was_playing {
            self.broadcast_player_counts().await;
        }
    }

    async fn handle_timeout(&mut self, client: Client) {
        if let Some((room_id, _)) = client.membership {
            if let Some(room) = self.rooms.get(&room_id) {
                Self::report(room.leave(client.id));
            }
            self.broadcast_player_counts().await;
        }
    }

    async fn handle_elimination(&mut self, client_id: ClientId, room_id: RoomId, entity_id: EntityId) {
        let cleared = {
            let mut clients = self.clients.write().await;
            // Only clear if the client has not moved on since
            let current = clients.get(client_id).and_then(|c| c.membership);
            current == Some((room_id, entity_id)) && clients.clear_membership(client_id).is_some()
        };

        if cleared {
            info!("Client {} was eliminated in room {}", client_id, room_id);
            self.broadcast_player_counts().await;
        }
    }

    fn report(result: Result<(), GameError>) {
        if let Err(e) = result {
            error!("Room request failed: {}", e);
        }
    }

    fn stop_rooms(&self) {
        for room in self.rooms.values() {
            if room.shutdown().is_err() {
                debug!("Room {} already stopped", room.id());
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), NetError> {
        // Initialize concurrent tasks
        self.spawn_rooms();
        let receiver = self.spawn_network_receiver();
        let sender = self.spawn_network_sender();
        let timeouts = self.spawn_timeout_checker();
        self.tasks.extend([receiver, sender, timeouts]);

        let mut count_interval = interval(Duration::from_secs(1));

        info!(
            "Server started with {} rooms on {}",
            self.rooms.len(),
            self.local_addr()?
        );

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client }) => {
                            self.handle_timeout(client).await;
                        },
                        Some(ServerMessage::PlayerEliminated { client_id, room_id, entity_id }) => {
                            self.handle_elimination(client_id, room_id, entity_id).await;
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = count_interval.tick() => {
                    let connected = {
                        let clients = self.clients.read().await;
                        clients.len()
                    };
                    if connected > 0 {
                        self.broadcast_player_counts().await;
                    }
                },
            }
        }

        self.stop_rooms();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        Ok(())
    }
}
