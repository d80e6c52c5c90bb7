//! Per-room actor task.
//!
//! Each room runs in its own tokio task that owns the [`Room`] outright. Join,
//! leave, move, chat and update requests arrive as [`RoomCommand`]s on an
//! mpsc mailbox and are handled between ticks, so nothing ever mutates the
//! entity store while a tick is iterating it. Rooms share no state with each
//! other.

use crate::error::GameError;
use crate::network::{fit_snapshot, GameMessage, ServerMessage};
use crate::room::{Room, RoomConfig};
use log::{debug, error, info};
use shared::{ClientId, EntityId, JoinRequest, MoveIntent, Packet, PlayerUpdate, RoomId};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Requests the gateway sends to a room.
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        client_id: ClientId,
        addr: SocketAddr,
        request: JoinRequest,
        reply: oneshot::Sender<Result<EntityId, GameError>>,
    },
    Leave {
        client_id: ClientId,
    },
    Move {
        client_id: ClientId,
        intent: MoveIntent,
    },
    Chat {
        client_id: ClientId,
        text: String,
    },
    Update {
        client_id: ClientId,
        update: PlayerUpdate,
    },
    Shutdown,
}

/// Cheap, cloneable handle to a running room.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    config: RoomConfig,
    tx: mpsc::UnboundedSender<RoomCommand>,
}

impl RoomHandle {
    pub fn id(&self) -> RoomId {
        self.config.id
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    fn send(&self, command: RoomCommand) -> Result<(), GameError> {
        self.tx
            .send(command)
            .map_err(|_| GameError::RoomClosed(self.config.id))
    }

    /// Joins the room and waits for the assigned player id.
    ///
    /// On success the room has already queued `Init` and a full snapshot for
    /// `addr`.
    pub async fn join(&self, client_id: ClientId, addr: SocketAddr, request: JoinRequest) -> Result<EntityId, GameError> {
        let (reply, response) = oneshot::channel();
        self.send(RoomCommand::Join {
            client_id,
            addr,
            request,
            reply,
        })?;
        response
            .await
            .map_err(|_| GameError::RoomClosed(self.config.id))?
    }

    pub fn leave(&self, client_id: ClientId) -> Result<(), GameError> {
        self.send(RoomCommand::Leave { client_id })
    }

    pub fn set_intent(&self, client_id: ClientId, intent: MoveIntent) -> Result<(), GameError> {
        self.send(RoomCommand::Move { client_id, intent })
    }

    pub fn chat(&self, client_id: ClientId, text: String) -> Result<(), GameError> {
        self.send(RoomCommand::Chat { client_id, text })
    }

    pub fn update_player(&self, client_id: ClientId, update: PlayerUpdate) -> Result<(), GameError> {
        self.send(RoomCommand::Update { client_id, update })
    }

    pub fn shutdown(&self) -> Result<(), GameError> {
        self.send(RoomCommand::Shutdown)
    }
}

/// Starts the room's task and returns a handle to it.
///
/// Outgoing packets go to `outbound`; eliminations are reported on `events`
/// so the gateway can clear the victim's membership.
pub fn spawn_room(
    room: Room,
    tick_duration: Duration,
    outbound: mpsc::UnboundedSender<GameMessage>,
    events: mpsc::UnboundedSender<ServerMessage>,
) -> (RoomHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = RoomHandle {
        config: room.config().clone(),
        tx,
    };
    let actor = RoomActor {
        room,
        members: BTreeMap::new(),
        outbound,
        events,
    };
    let task = tokio::spawn(actor.run(rx, tick_duration));
    (handle, task)
}

struct RoomActor {
    room: Room,
    /// Where to deliver packets for each member
    members: BTreeMap<ClientId, SocketAddr>,
    outbound: mpsc::UnboundedSender<GameMessage>,
    events: mpsc::UnboundedSender<ServerMessage>,
}

impl RoomActor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<RoomCommand>, tick_duration: Duration) {
        let mut tick_interval = interval(tick_duration);
        // A tick that overruns the period makes the next one skip, never overlap
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tick_interval.tick().await;
        let mut last_tick = Instant::now();

        info!("Room {} running at {:?} per tick", self.room.id(), tick_duration);

        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(RoomCommand::Shutdown) | None => {
                            info!("Room {} shutting down", self.room.id());
                            break;
                        }
                        Some(command) => self.handle_command(command),
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick);
                    last_tick = now;
                    self.run_tick(dt);
                },
            }
        }
    }

    fn handle_command(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Join {
                client_id,
                addr,
                request,
                reply,
            } => {
                let result = self.room.join(client_id, &request);
                if let Ok(id) = result {
                    self.members.insert(client_id, addr);
                    self.send(
                        Packet::Init {
                            id,
                            room_id: self.room.id(),
                        },
                        addr,
                    );
                    self.send(Packet::GameState(fit_snapshot(self.room.snapshot())), addr);
                }
                let joined = result.is_ok();
                if reply.send(result).is_err() && joined {
                    // Nobody recorded the membership, so undo it
                    self.remove_member(client_id);
                }
            }
            RoomCommand::Leave { client_id } => self.remove_member(client_id),
            RoomCommand::Move { client_id, intent } => {
                if !self.room.set_intent(client_id, intent) {
                    debug!("Room {}: move from non-member {}", self.room.id(), client_id);
                }
            }
            RoomCommand::Chat { client_id, text } => {
                if let Some((sender, name, text)) = self.room.chat_line(client_id, &text) {
                    self.multicast(Packet::ChatMessage { sender, name, text });
                }
            }
            RoomCommand::Update { client_id, update } => {
                self.room.update_player(client_id, update);
            }
            RoomCommand::Shutdown => {}
        }
    }

    fn remove_member(&mut self, client_id: ClientId) {
        self.members.remove(&client_id);
        self.room.leave(client_id);
    }

    fn run_tick(&mut self, dt: Duration) {
        let report = self.room.tick(dt);

        for elimination in &report.eliminations {
            if let Some(addr) = self.members.remove(&elimination.client_id) {
                self.send(
                    Packet::Eliminated {
                        by: elimination.by,
                    },
                    addr,
                );
            }
            if let Err(e) = self.events.send(ServerMessage::PlayerEliminated {
                client_id: elimination.client_id,
                room_id: self.room.id(),
                entity_id: elimination.entity_id,
            }) {
                error!("Failed to report elimination: {}", e);
            }
        }

        if report.tick % 100 == 0 {
            debug!(
                "Room {} tick {}: {} members, {} entities, {} consumed, {} spawned",
                self.room.id(),
                report.tick,
                self.members.len(),
                self.room.store().len(),
                report.consumed.len(),
                report.spawned
            );
        }

        if !self.members.is_empty() {
            self.multicast(Packet::GameState(fit_snapshot(self.room.snapshot())));
        }
    }

    fn send(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.outbound.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn multicast(&self, packet: Packet) {
        let addrs: Vec<SocketAddr> = self.members.values().copied().collect();
        if let Err(e) = self.outbound.send(GameMessage::Multicast { packet, addrs }) {
            error!("Failed to queue room broadcast: {}", e);
        }
    }
}
