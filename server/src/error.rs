//! Error types for the room engine and its store.

use shared::{ClientId, EntityId, RoomId};

/// Errors raised by room and entity store operations.
///
/// None of these are fatal to a room: the offending request is rejected and
/// the tick carries on for everyone else.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    /// An entity with this id is already alive in the store.
    #[error("entity {0} already exists")]
    DuplicateId(EntityId),

    /// The requested room does not exist on this server.
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// The room has reached its member capacity.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The client already owns a player in this room.
    #[error("client {0} already joined room {1}")]
    AlreadyJoined(ClientId, RoomId),

    /// The room's task has stopped and no longer accepts commands.
    #[error("room {0} is no longer running")]
    RoomClosed(RoomId),

    /// World extents must be finite and positive.
    #[error("invalid world size {0}x{1}")]
    InvalidWorld(f32, f32),
}

/// Errors while putting a packet on the wire.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Failed to encode a packet with bincode.
    #[error("failed to encode packet: {0}")]
    Encode(#[from] bincode::Error),

    /// The encoded packet does not fit in one datagram.
    #[error("packet of {0} bytes exceeds the datagram limit")]
    Oversized(usize),

    /// Socket send failed.
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}
