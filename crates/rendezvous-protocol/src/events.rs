//! Inbound and outbound events.
//!
//! Both enums use serde's "adjacently tagged" representation, so every
//! frame looks like:
//!
//! ```text
//! { "event": "media-play", "data": { "room": "movie-night", "timestamp": 12.5 } }
//! ```
//!
//! Event names are kebab-case, payload fields camelCase
//! (`rename_all_fields`). Negotiation and media payloads are
//! `serde_json::Value` — the relay forwards them without looking inside.

use rendezvous_transport::ConnectionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{MediaPeerInfo, PeerInfo, SignalKind};

// ---------------------------------------------------------------------------
// ClientEvent — client → relay
// ---------------------------------------------------------------------------

/// Everything a client may send.
///
/// Call-room events name their room in `room` (or `roomName` for
/// join/leave); media-room events name the *un-namespaced* room, the
/// relay keeps call and media rooms apart on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    // -- Call rooms --
    /// Join (or refresh membership in) a call room.
    JoinRoom {
        room_name: String,
        #[serde(default)]
        display_name: Option<String>,
    },

    /// Leave a call room. Leaving a room you are not in is a no-op.
    LeaveRoom { room_name: String },

    /// Session description offer for one peer in a room.
    Offer {
        to: ConnectionId,
        room: String,
        #[serde(default)]
        payload: Value,
    },

    /// Session description answer for one peer in a room.
    Answer {
        to: ConnectionId,
        room: String,
        #[serde(default)]
        payload: Value,
    },

    /// ICE candidate for one peer in a room.
    IceCandidate {
        to: ConnectionId,
        room: String,
        #[serde(default)]
        payload: Value,
    },

    /// Text chat to the rest of a call room.
    ChatMessage {
        room: String,
        message: String,
        #[serde(default)]
        user_name: Option<String>,
    },

    /// Camera/microphone on-off announcement.
    UserMediaUpdate {
        room: String,
        #[serde(default)]
        video: bool,
        #[serde(default)]
        audio: bool,
    },

    /// Rename yourself within a call room.
    UpdateDisplayName { room: String, display_name: String },

    // -- Media rooms --
    /// Join (or refresh membership in) a media room.
    JoinMediaRoom {
        room_name: String,
        #[serde(default)]
        display_name: Option<String>,
    },

    /// Leave a media room.
    LeaveMediaRoom { room_name: String },

    /// Take over the host role voluntarily.
    MediaBecomeHost { room_name: String },

    /// Host only: select the current media item.
    MediaLoad {
        room: String,
        #[serde(default)]
        media: Value,
    },

    /// Host only: start playback at `timestamp` (seconds, client clock).
    MediaPlay {
        room: String,
        #[serde(default)]
        timestamp: Option<f64>,
    },

    /// Host only: pause playback.
    MediaPause { room: String },

    /// Ask the host for its playback position.
    MediaSyncRequest { room: String },

    /// Host only: answer a sync request from `to`.
    MediaSyncResponse {
        room: String,
        to: ConnectionId,
        #[serde(default)]
        timestamp: Option<f64>,
        #[serde(default)]
        is_playing: bool,
    },

    /// Host only: replace the playback queue wholesale.
    MediaQueueUpdate {
        room: String,
        #[serde(default)]
        queue: Vec<Value>,
    },

    /// Text chat to the rest of a media room.
    MediaChatMessage {
        room: String,
        message: String,
        #[serde(default)]
        user_name: Option<String>,
    },

    /// Screen sharing began.
    ScreenShareStarted {
        room: String,
        #[serde(default)]
        has_audio: bool,
    },

    /// Screen sharing ended.
    ScreenShareStopped { room: String },
}

impl ClientEvent {
    /// The wire name of this event, for logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::JoinRoom { .. } => "join-room",
            ClientEvent::LeaveRoom { .. } => "leave-room",
            ClientEvent::Offer { .. } => SignalKind::Offer.as_str(),
            ClientEvent::Answer { .. } => SignalKind::Answer.as_str(),
            ClientEvent::IceCandidate { .. } => {
                SignalKind::IceCandidate.as_str()
            }
            ClientEvent::ChatMessage { .. } => "chat-message",
            ClientEvent::UserMediaUpdate { .. } => "user-media-update",
            ClientEvent::UpdateDisplayName { .. } => "update-display-name",
            ClientEvent::JoinMediaRoom { .. } => "join-media-room",
            ClientEvent::LeaveMediaRoom { .. } => "leave-media-room",
            ClientEvent::MediaBecomeHost { .. } => "media-become-host",
            ClientEvent::MediaLoad { .. } => "media-load",
            ClientEvent::MediaPlay { .. } => "media-play",
            ClientEvent::MediaPause { .. } => "media-pause",
            ClientEvent::MediaSyncRequest { .. } => "media-sync-request",
            ClientEvent::MediaSyncResponse { .. } => "media-sync-response",
            ClientEvent::MediaQueueUpdate { .. } => "media-queue-update",
            ClientEvent::MediaChatMessage { .. } => "media-chat-message",
            ClientEvent::ScreenShareStarted { .. } => "screen-share-started",
            ClientEvent::ScreenShareStopped { .. } => "screen-share-stopped",
        }
    }
}

// ---------------------------------------------------------------------------
// ServerEvent — relay → client
// ---------------------------------------------------------------------------

/// Everything the relay may send.
///
/// Relayed events carry the sender's connection id (`from` / `userId`)
/// so receivers can correlate without any server-side session lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// First frame on every connection: the id peers will know you by.
    Connected { id: ConnectionId },

    // -- Call rooms --
    /// To the joiner: who else is already in the room.
    RoomJoined {
        room: String,
        participants: Vec<PeerInfo>,
    },

    /// To the rest of the room: someone joined.
    UserConnected {
        id: ConnectionId,
        display_name: String,
    },

    /// To the rest of the room: someone left or disconnected.
    UserDisconnected { id: ConnectionId },

    Offer {
        from: ConnectionId,
        room: String,
        payload: Value,
    },

    Answer {
        from: ConnectionId,
        room: String,
        payload: Value,
    },

    IceCandidate {
        from: ConnectionId,
        room: String,
        payload: Value,
    },

    ChatMessage {
        user_id: ConnectionId,
        user_name: Option<String>,
        message: String,
    },

    UserMediaUpdate {
        user_id: ConnectionId,
        video: bool,
        audio: bool,
    },

    UpdateDisplayName {
        user_id: ConnectionId,
        display_name: String,
    },

    // -- Media rooms --
    /// To the joiner: the full room state.
    MediaRoomJoined {
        room: String,
        is_host: bool,
        host_id: ConnectionId,
        participants: Vec<MediaPeerInfo>,
        queue: Vec<Value>,
        current_media: Option<Value>,
    },

    /// To the rest of the room: someone joined.
    MediaUserJoined {
        user_id: ConnectionId,
        user: MediaPeerInfo,
    },

    /// To the rest of the room: someone left or disconnected.
    MediaUserLeft { user_id: ConnectionId, was_host: bool },

    /// To the whole room, new host included.
    MediaHostChanged { host_id: ConnectionId },

    MediaLoad { from: ConnectionId, media: Value },

    MediaPlay {
        from: ConnectionId,
        timestamp: Option<f64>,
    },

    MediaPause { from: ConnectionId },

    MediaQueueUpdate {
        from: ConnectionId,
        queue: Vec<Value>,
    },

    /// To the host only: a participant wants the playback position.
    MediaSyncRequest { requester_id: ConnectionId },

    /// To the requester only: the host's answer.
    MediaSyncResponse {
        from: ConnectionId,
        timestamp: Option<f64>,
        is_playing: bool,
    },

    MediaChatMessage {
        user_id: ConnectionId,
        user_name: Option<String>,
        message: String,
    },

    ScreenShareStarted { user_id: ConnectionId, has_audio: bool },

    ScreenShareStopped { user_id: ConnectionId },

    // -- Errors --
    /// To the originating connection only.
    Error { message: String },
}

impl ServerEvent {
    /// Builds the outbound form of a point-to-point negotiation event.
    pub fn signal(
        kind: SignalKind,
        from: ConnectionId,
        room: String,
        payload: Value,
    ) -> Self {
        match kind {
            SignalKind::Offer => ServerEvent::Offer { from, room, payload },
            SignalKind::Answer => ServerEvent::Answer { from, room, payload },
            SignalKind::IceCandidate => {
                ServerEvent::IceCandidate { from, room, payload }
            }
        }
    }

    /// Shorthand for an [`Error`](ServerEvent::Error) event.
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }
}
