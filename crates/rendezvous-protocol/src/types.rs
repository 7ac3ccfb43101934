//! Building blocks shared by the inbound and outbound event enums.

use std::fmt;

use rendezvous_transport::ConnectionId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Recipient — who should receive an event?
// ---------------------------------------------------------------------------

/// Specifies who in a room should receive an outbound event.
///
/// Events for a single connection skip this and are addressed directly.
///
/// The relay resolves a `Recipient` against a room's current member list
/// at the moment the event is produced; members that joined later never
/// see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every member of the room, the sender included.
    All,

    /// Every member except the given connection (usually the sender).
    AllExcept(ConnectionId),
}

impl Recipient {
    /// Returns `true` if `id` is addressed by this recipient.
    pub fn includes(&self, id: ConnectionId) -> bool {
        match self {
            Recipient::All => true,
            Recipient::AllExcept(excluded) => *excluded != id,
        }
    }
}

// ---------------------------------------------------------------------------
// SignalKind — the three point-to-point negotiation events
// ---------------------------------------------------------------------------

/// The negotiation events relayed from one peer to exactly one other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// A session description offer.
    Offer,
    /// A session description answer.
    Answer,
    /// A trickled ICE candidate.
    IceCandidate,
}

impl SignalKind {
    /// The wire name of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::IceCandidate => "ice-candidate",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Participant views
// ---------------------------------------------------------------------------

/// A call-room participant as clients see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub id: ConnectionId,
    pub display_name: String,
}

/// A media-room participant as clients see it.
///
/// `is_host` is computed from the room's host at the time the view is
/// built; it is never stored per participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPeerInfo {
    pub id: ConnectionId,
    pub name: String,
    pub is_host: bool,
}
