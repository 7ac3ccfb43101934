//! Call rooms: flat membership for peer-to-peer negotiation.

use std::collections::HashMap;

use rendezvous_protocol::{ConnectionId, PeerInfo};

use crate::{RoomError, validate_room_name};

/// One call room. Participant order is irrelevant.
#[derive(Debug, Default)]
struct CallRoom {
    /// Connection → display name.
    participants: HashMap<ConnectionId, String>,
}

impl CallRoom {
    /// Member ids, sorted so fan-out order is reproducible.
    fn member_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> =
            self.participants.keys().copied().collect();
        ids.sort();
        ids
    }
}

/// Result of a successful [`CallRoomRegistry::join`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallJoin {
    /// The room joined.
    pub room: String,
    /// The display name recorded for the joiner.
    pub display_name: String,
    /// Everyone already in the room, joiner excluded. Sent to the joiner.
    pub existing: Vec<PeerInfo>,
    /// Who must be told about the joiner.
    pub notify: Vec<ConnectionId>,
    /// The room implicitly left to make this join, if any.
    pub previous: Option<CallLeave>,
}

/// Result of removing a connection from a call room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallLeave {
    /// The room left.
    pub room: String,
    /// Who is still in the room and must be told.
    pub remaining: Vec<ConnectionId>,
    /// `true` if the room was deleted because it became empty.
    pub room_deleted: bool,
}

/// Registry of all call rooms.
///
/// Rooms are created on first join and deleted the instant their last
/// participant leaves.
#[derive(Debug, Default)]
pub struct CallRoomRegistry {
    /// Active rooms, keyed by name.
    rooms: HashMap<String, CallRoom>,

    /// Maps each connection to the call room it is currently in.
    /// A connection can be in at most ONE call room at a time.
    member_rooms: HashMap<ConnectionId, String>,
}

impl CallRoomRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts `conn` into `room_name`, creating the room if needed.
    ///
    /// If `conn` is in a different call room it leaves that one first.
    /// Rejoining the same room just refreshes the display name.
    ///
    /// # Errors
    /// [`RoomError::InvalidName`] for a blank room name.
    pub fn join(
        &mut self,
        conn: ConnectionId,
        room_name: &str,
        display_name: &str,
    ) -> Result<CallJoin, RoomError> {
        validate_room_name(room_name)?;

        let previous = match self.member_rooms.get(&conn).cloned() {
            Some(current) if current != room_name => {
                self.leave(conn, &current)
            }
            _ => None,
        };

        let room = self.rooms.entry(room_name.to_owned()).or_insert_with(|| {
            tracing::info!(room = room_name, "call room created");
            CallRoom::default()
        });
        room.participants.insert(conn, display_name.to_owned());
        self.member_rooms.insert(conn, room_name.to_owned());

        let notify: Vec<ConnectionId> = room
            .member_ids()
            .into_iter()
            .filter(|id| *id != conn)
            .collect();
        let existing = notify
            .iter()
            .filter_map(|id| {
                room.participants.get(id).map(|name| PeerInfo {
                    id: *id,
                    display_name: name.clone(),
                })
            })
            .collect();

        tracing::info!(
            room = room_name,
            %conn,
            participants = room.participants.len(),
            "joined call room"
        );

        Ok(CallJoin {
            room: room_name.to_owned(),
            display_name: display_name.to_owned(),
            existing,
            notify,
            previous,
        })
    }

    /// Removes `conn` from `room_name`.
    ///
    /// Returns `None` (and changes nothing) if the room doesn't exist or
    /// `conn` isn't in it.
    pub fn leave(
        &mut self,
        conn: ConnectionId,
        room_name: &str,
    ) -> Option<CallLeave> {
        let room = self.rooms.get_mut(room_name)?;
        let name = room.participants.remove(&conn)?;

        if self.member_rooms.get(&conn).is_some_and(|r| r == room_name) {
            self.member_rooms.remove(&conn);
        }

        tracing::info!(
            room = room_name,
            %conn,
            display_name = %name,
            participants = room.participants.len(),
            "left call room"
        );

        let remaining = room.member_ids();
        let room_deleted = remaining.is_empty();
        if room_deleted {
            self.rooms.remove(room_name);
            tracing::info!(room = room_name, "call room deleted (empty)");
        }

        Some(CallLeave {
            room: room_name.to_owned(),
            remaining,
            room_deleted,
        })
    }

    /// Removes `conn` from every call room that lists it.
    ///
    /// Scans the rooms themselves rather than trusting the membership
    /// index, so a connection is fully purged on disconnect.
    pub fn leave_all(&mut self, conn: ConnectionId) -> Vec<CallLeave> {
        let mut containing: Vec<String> = self
            .rooms
            .iter()
            .filter(|(_, room)| room.participants.contains_key(&conn))
            .map(|(name, _)| name.clone())
            .collect();
        containing.sort();

        let leaves = containing
            .iter()
            .filter_map(|name| self.leave(conn, name))
            .collect();
        self.member_rooms.remove(&conn);
        leaves
    }

    /// Renames `conn` within `room_name` and returns who should hear
    /// about it (everyone else in the room).
    ///
    /// The rename is recorded only if `conn` is a participant, but the
    /// announcement goes to the room either way.
    pub fn update_display_name(
        &mut self,
        conn: ConnectionId,
        room_name: &str,
        display_name: &str,
    ) -> Vec<ConnectionId> {
        let Some(room) = self.rooms.get_mut(room_name) else {
            return Vec::new();
        };
        if let Some(name) = room.participants.get_mut(&conn) {
            *name = display_name.to_owned();
        }
        room.member_ids()
            .into_iter()
            .filter(|id| *id != conn)
            .collect()
    }

    /// Checks that a targeted relay can be delivered: the room exists
    /// and `target` is in it.
    ///
    /// # Errors
    /// [`RoomError::TargetNotFound`] otherwise.
    pub fn check_target(
        &self,
        room_name: &str,
        target: ConnectionId,
    ) -> Result<(), RoomError> {
        let present = self
            .rooms
            .get(room_name)
            .is_some_and(|room| room.participants.contains_key(&target));
        if !present {
            return Err(RoomError::TargetNotFound {
                target,
                room: room_name.to_owned(),
            });
        }
        Ok(())
    }

    /// All members of a room, or `None` if it doesn't exist.
    pub fn members(&self, room_name: &str) -> Option<Vec<ConnectionId>> {
        self.rooms.get(room_name).map(CallRoom::member_ids)
    }

    /// The display name recorded for `conn` in `room_name`.
    pub fn display_name(
        &self,
        room_name: &str,
        conn: ConnectionId,
    ) -> Option<&str> {
        self.rooms
            .get(room_name)?
            .participants
            .get(&conn)
            .map(String::as_str)
    }

    /// The call room `conn` is currently in.
    pub fn room_of(&self, conn: ConnectionId) -> Option<&str> {
        self.member_rooms.get(&conn).map(String::as_str)
    }

    /// Returns `true` if the room exists.
    pub fn contains_room(&self, room_name: &str) -> bool {
        self.rooms.contains_key(room_name)
    }

    /// Returns the number of active rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
