//! # Rendezvous
//!
//! Signaling relay for peer-to-peer calls and host-led media rooms.
//!
//! The relay never touches audio or video. It tracks who is in which
//! room, forwards opaque negotiation payloads between peers, and lets
//! exactly one host per media room drive playback.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rendezvous::prelude::*;
//!
//! # async fn start() -> Result<(), RendezvousError> {
//! let server = RendezvousServer::builder()
//!     .bind("0.0.0.0:3000")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! The dispatch rules live in [`Relay`], which can be driven directly
//! without any sockets.

mod config;
mod error;
mod handler;
mod relay;
mod server;

pub use config::{ConfigError, ServerConfig};
pub use error::RendezvousError;
pub use relay::{Delivery, Relay};
pub use server::{RendezvousServer, RendezvousServerBuilder};

/// Everything needed to run a relay or drive one in tests.
pub mod prelude {
    pub use crate::{
        ConfigError, Delivery, Relay, RendezvousError, RendezvousServer,
        RendezvousServerBuilder, ServerConfig,
    };
    pub use rendezvous_protocol::{
        ClientEvent, Codec, ConnectionId, JsonCodec, MediaPeerInfo,
        PeerInfo, ServerEvent,
    };
}
