//! Error types for the room layer.

use rendezvous_protocol::ConnectionId;

use crate::MediaRoomKey;

/// Errors that can occur during room operations.
///
/// None of these are fatal; each one ends the handling of a single
/// inbound event.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// An empty (or whitespace-only) room name was supplied.
    #[error("room name must not be empty")]
    InvalidName,

    /// The media room does not exist.
    #[error("room {0} not found")]
    NotFound(MediaRoomKey),

    /// A targeted relay named a room that doesn't exist or a target that
    /// isn't in it.
    #[error("target {target} not found in room {room}")]
    TargetNotFound { target: ConnectionId, room: String },

    /// The sender is not a participant of the media room.
    #[error("{conn} is not in room {room}")]
    NotParticipant { conn: ConnectionId, room: MediaRoomKey },

    /// The sender is a participant but not the current host.
    #[error("{conn} is not the host of room {room}")]
    NotHost { conn: ConnectionId, room: MediaRoomKey },
}
