//! Connection session management for Rendezvous.
//!
//! This crate is the relay's record of who is connected right now:
//!
//! 1. **Identity** — the [`ConnectionId`](rendezvous_protocol::ConnectionId)
//!    handed out by the transport, plus a mutable display name that
//!    defaults to one derived from the id.
//! 2. **Delivery** — each session owns the sending half of its
//!    connection's outbound queue ([`Outbox`]). Delivering to a connection
//!    that already went away is a silent no-op.
//!
//! # How it fits in the stack
//!
//! ```text
//! Relay (above)  ← resolves names and delivers events through sessions
//!     ↕
//! Session Layer (this crate)  ← identity + outbound queues
//!     ↕
//! Protocol Layer (below)  ← ConnectionId, ServerEvent
//! ```
//!
//! Room membership is deliberately NOT tracked here; the room registries
//! keep their own per-connection index.

mod error;
mod manager;
mod session;

pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{default_display_name, Outbox, Session};
