//! Room membership for Rendezvous.
//!
//! Two independent kinds of rooms live here, each in its own registry:
//!
//! - [`CallRoomRegistry`] — peer-to-peer call rooms. Flat membership, no
//!   roles. Used to validate targeted negotiation relays.
//! - [`MediaRoomRegistry`] — synchronized-viewing rooms. Adds a single
//!   host who alone may change the media, playback state, or queue.
//!
//! Both registries are plain synchronous data structures. They never send
//! anything; every mutating call returns an outcome struct that says who
//! must be told what, and the relay turns that into events. That keeps
//! every invariant here testable without a transport.
//!
//! # Invariants
//!
//! - A room exists if and only if it has at least one participant.
//! - A connection is in at most one call room and one media room.
//! - A non-empty media room has exactly one host, and the host is one
//!   of its participants.

mod call;
mod error;
mod media;
mod name;

pub use call::{CallJoin, CallLeave, CallRoomRegistry};
pub use error::RoomError;
pub use media::{HostChange, MediaJoin, MediaLeave, MediaRoom, MediaRoomRegistry};
pub use name::{validate_room_name, MediaRoomKey};
