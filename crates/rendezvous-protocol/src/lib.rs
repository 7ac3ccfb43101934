//! Wire protocol for Rendezvous.
//!
//! This crate defines the "language" that browser clients and the relay
//! speak:
//!
//! - **Events** ([`ClientEvent`], [`ServerEvent`]) — every frame is one
//!   named event with a JSON payload: `{"event": "join-room", "data": {...}}`.
//! - **Types** ([`Recipient`], [`SignalKind`], [`PeerInfo`],
//!   [`MediaPeerInfo`]) — the pieces events are built from.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how events are turned
//!   into bytes and back.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while doing so.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw frames) and the room
//! registries. It knows nothing about membership or hosts; negotiation
//! payloads (session descriptions, ICE candidates, media items) stay
//! opaque `serde_json::Value`s end to end.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientEvent) → Relay (rooms, hosts)
//! ```

mod codec;
mod error;
mod events;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use events::{ClientEvent, ServerEvent};
pub use rendezvous_transport::ConnectionId;
pub use types::{MediaPeerInfo, PeerInfo, Recipient, SignalKind};
