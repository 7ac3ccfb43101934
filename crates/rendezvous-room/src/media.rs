//! Media rooms: synchronized viewing with a single host.
//!
//! The host is stored once per room (`MediaRoom::host`) and every
//! participant's `is_host` flag is derived from it, so "exactly one
//! host" cannot drift out of sync with the participant list.

use std::collections::HashMap;

use rendezvous_protocol::{ConnectionId, MediaPeerInfo};
use serde_json::Value;

use crate::{MediaRoomKey, RoomError, validate_room_name};

#[derive(Debug, Clone)]
struct MediaParticipant {
    id: ConnectionId,
    name: String,
}

/// One media room.
#[derive(Debug)]
pub struct MediaRoom {
    /// Participants in join order. Host election walks this front to back.
    participants: Vec<MediaParticipant>,
    host: ConnectionId,
    current_media: Option<Value>,
    queue: Vec<Value>,
}

impl MediaRoom {
    fn new(host: ConnectionId) -> Self {
        Self {
            participants: Vec::new(),
            host,
            current_media: None,
            queue: Vec::new(),
        }
    }

    /// The current host.
    pub fn host(&self) -> ConnectionId {
        self.host
    }

    /// Returns `true` if `id` is the current host.
    pub fn is_host(&self, id: ConnectionId) -> bool {
        self.host == id
    }

    /// Returns `true` if `id` is a participant.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.participants.iter().any(|p| p.id == id)
    }

    /// Participant ids in join order.
    pub fn member_ids(&self) -> Vec<ConnectionId> {
        self.participants.iter().map(|p| p.id).collect()
    }

    /// Client-facing participant list, in join order.
    pub fn peers(&self) -> Vec<MediaPeerInfo> {
        self.participants
            .iter()
            .map(|p| self.peer_info(p))
            .collect()
    }

    /// The currently selected media item.
    pub fn current_media(&self) -> Option<&Value> {
        self.current_media.as_ref()
    }

    /// The playback queue.
    pub fn queue(&self) -> &[Value] {
        &self.queue
    }

    /// Number of participants.
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Always `false` for a room reachable through the registry.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    fn others(&self, id: ConnectionId) -> Vec<ConnectionId> {
        self.participants
            .iter()
            .map(|p| p.id)
            .filter(|pid| *pid != id)
            .collect()
    }

    fn peer_info(&self, p: &MediaParticipant) -> MediaPeerInfo {
        MediaPeerInfo {
            id: p.id,
            name: p.name.clone(),
            is_host: self.is_host(p.id),
        }
    }
}

/// Result of a successful [`MediaRoomRegistry::join`].
#[derive(Debug, Clone, PartialEq)]
pub struct MediaJoin {
    /// Client-facing room name.
    pub room: String,
    /// The joiner as the rest of the room sees it.
    pub joiner: MediaPeerInfo,
    /// Current host (the joiner itself if it created the room).
    pub host: ConnectionId,
    /// Everyone in the room, joiner included, in join order.
    pub participants: Vec<MediaPeerInfo>,
    pub queue: Vec<Value>,
    pub current_media: Option<Value>,
    /// Who must be told about the joiner.
    pub notify: Vec<ConnectionId>,
    /// The media room implicitly left to make this join, if any.
    pub previous: Option<MediaLeave>,
}

/// Result of removing a connection from a media room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLeave {
    /// Client-facing room name.
    pub room: String,
    /// Whether the departing connection held the host role.
    pub was_host: bool,
    /// Who is still in the room, in join order.
    pub remaining: Vec<ConnectionId>,
    /// The promoted participant, if the host left a non-empty room.
    pub new_host: Option<ConnectionId>,
    /// `true` if the room was deleted because it became empty.
    pub room_deleted: bool,
}

/// Result of a voluntary host handoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostChange {
    /// Client-facing room name.
    pub room: String,
    pub host: ConnectionId,
    pub previous_host: ConnectionId,
    /// Everyone in the room; all of them are told.
    pub members: Vec<ConnectionId>,
}

/// Registry of all media rooms.
#[derive(Debug, Default)]
pub struct MediaRoomRegistry {
    rooms: HashMap<MediaRoomKey, MediaRoom>,

    /// A connection is in at most ONE media room at a time.
    member_rooms: HashMap<ConnectionId, MediaRoomKey>,
}

impl MediaRoomRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts `conn` into the media room `room_name`.
    ///
    /// The connection first leaves any other media room it is in (which
    /// may hand that room's host role on). The creator of a room becomes
    /// its host; later joiners never do. Rejoining the same room refreshes
    /// the display name and keeps the original join position.
    ///
    /// # Errors
    /// [`RoomError::InvalidName`] for a blank room name.
    pub fn join(
        &mut self,
        conn: ConnectionId,
        room_name: &str,
        display_name: &str,
    ) -> Result<MediaJoin, RoomError> {
        validate_room_name(room_name)?;
        let key = MediaRoomKey::new(room_name);

        let previous = match self.member_rooms.get(&conn).cloned() {
            Some(current) if current != key => self.leave_key(conn, &current),
            _ => None,
        };

        let room = self.rooms.entry(key.clone()).or_insert_with(|| {
            tracing::info!(room = %key, host = %conn, "media room created");
            MediaRoom::new(conn)
        });

        match room.participants.iter_mut().find(|p| p.id == conn) {
            Some(existing) => existing.name = display_name.to_owned(),
            None => room.participants.push(MediaParticipant {
                id: conn,
                name: display_name.to_owned(),
            }),
        }
        self.member_rooms.insert(conn, key.clone());

        let joiner = MediaPeerInfo {
            id: conn,
            name: display_name.to_owned(),
            is_host: room.is_host(conn),
        };

        tracing::info!(
            room = %key,
            %conn,
            is_host = joiner.is_host,
            participants = room.len(),
            "joined media room"
        );

        Ok(MediaJoin {
            room: room_name.to_owned(),
            joiner,
            host: room.host,
            participants: room.peers(),
            queue: room.queue.clone(),
            current_media: room.current_media.clone(),
            notify: room.others(conn),
            previous,
        })
    }

    /// Removes `conn` from the media room `room_name`.
    ///
    /// Returns `None` (and changes nothing) if the room doesn't exist or
    /// `conn` isn't in it. If the host leaves and others remain, the
    /// earliest remaining joiner becomes host.
    pub fn leave(
        &mut self,
        conn: ConnectionId,
        room_name: &str,
    ) -> Option<MediaLeave> {
        self.leave_key(conn, &MediaRoomKey::new(room_name))
    }

    fn leave_key(
        &mut self,
        conn: ConnectionId,
        key: &MediaRoomKey,
    ) -> Option<MediaLeave> {
        let room = self.rooms.get_mut(key)?;
        let pos = room.participants.iter().position(|p| p.id == conn)?;
        let departed = room.participants.remove(pos);

        if self.member_rooms.get(&conn) == Some(key) {
            self.member_rooms.remove(&conn);
        }

        let was_host = room.host == conn;
        tracing::info!(
            room = %key,
            %conn,
            name = %departed.name,
            was_host,
            participants = room.len(),
            "left media room"
        );

        let mut new_host = None;
        if was_host {
            if let Some(next) = room.participants.first() {
                room.host = next.id;
                new_host = Some(next.id);
                tracing::info!(room = %key, host = %next.id, "new host assigned");
            }
        }

        let remaining = room.member_ids();
        let room_deleted = remaining.is_empty();
        if room_deleted {
            self.rooms.remove(key);
            tracing::info!(room = %key, "media room deleted (empty)");
        }

        Some(MediaLeave {
            room: key.room_name().to_owned(),
            was_host,
            remaining,
            new_host,
            room_deleted,
        })
    }

    /// Removes `conn` from every media room that lists it.
    pub fn leave_all(&mut self, conn: ConnectionId) -> Vec<MediaLeave> {
        let mut containing: Vec<MediaRoomKey> = self
            .rooms
            .iter()
            .filter(|(_, room)| room.contains(conn))
            .map(|(key, _)| key.clone())
            .collect();
        containing.sort_by(|a, b| a.to_string().cmp(&b.to_string()));

        let leaves = containing
            .iter()
            .filter_map(|key| self.leave_key(conn, key))
            .collect();
        self.member_rooms.remove(&conn);
        leaves
    }

    /// Makes `conn` the host of `room_name`.
    ///
    /// Returns `None` if the room doesn't exist or `conn` isn't a
    /// participant. Asking while already host still yields a
    /// [`HostChange`] (with `previous_host == host`) so the room can be
    /// re-told.
    pub fn transfer_host(
        &mut self,
        conn: ConnectionId,
        room_name: &str,
    ) -> Option<HostChange> {
        let key = MediaRoomKey::new(room_name);
        let room = self.rooms.get_mut(&key)?;
        if !room.contains(conn) {
            return None;
        }

        let previous_host = std::mem::replace(&mut room.host, conn);
        tracing::info!(room = %key, host = %conn, %previous_host, "host transferred");

        Some(HostChange {
            room: room_name.to_owned(),
            host: conn,
            previous_host,
            members: room.member_ids(),
        })
    }

    /// Resolves the room and checks that `conn` is its host.
    fn host_gate(
        &mut self,
        conn: ConnectionId,
        room_name: &str,
    ) -> Result<&mut MediaRoom, RoomError> {
        let key = MediaRoomKey::new(room_name);
        let Some(room) = self.rooms.get_mut(&key) else {
            return Err(RoomError::NotFound(key));
        };
        if !room.contains(conn) {
            return Err(RoomError::NotParticipant { conn, room: key });
        }
        if !room.is_host(conn) {
            return Err(RoomError::NotHost { conn, room: key });
        }
        Ok(room)
    }

    /// Host only: replaces the current media item. Returns who to forward
    /// it to.
    ///
    /// # Errors
    /// [`RoomError::NotFound`], [`RoomError::NotParticipant`], or
    /// [`RoomError::NotHost`].
    pub fn set_media(
        &mut self,
        conn: ConnectionId,
        room_name: &str,
        media: Value,
    ) -> Result<Vec<ConnectionId>, RoomError> {
        let room = self.host_gate(conn, room_name)?;
        room.current_media = Some(media);
        Ok(room.others(conn))
    }

    /// Host only: authorizes a play/pause. Playback position is not
    /// stored; returns who to forward the command to.
    ///
    /// # Errors
    /// Same as [`set_media`](Self::set_media).
    pub fn authorize_playback(
        &mut self,
        conn: ConnectionId,
        room_name: &str,
    ) -> Result<Vec<ConnectionId>, RoomError> {
        let room = self.host_gate(conn, room_name)?;
        Ok(room.others(conn))
    }

    /// Host only: replaces the queue wholesale.
    ///
    /// # Errors
    /// Same as [`set_media`](Self::set_media).
    pub fn update_queue(
        &mut self,
        conn: ConnectionId,
        room_name: &str,
        queue: Vec<Value>,
    ) -> Result<Vec<ConnectionId>, RoomError> {
        let room = self.host_gate(conn, room_name)?;
        room.queue = queue;
        Ok(room.others(conn))
    }

    /// Routes a sync request: `Some(host)` when a participant asks,
    /// `None` when the host asks itself (nothing to do).
    ///
    /// # Errors
    /// [`RoomError::NotFound`] or [`RoomError::NotParticipant`].
    pub fn sync_request(
        &self,
        conn: ConnectionId,
        room_name: &str,
    ) -> Result<Option<ConnectionId>, RoomError> {
        let key = MediaRoomKey::new(room_name);
        let Some(room) = self.rooms.get(&key) else {
            return Err(RoomError::NotFound(key));
        };
        if !room.contains(conn) {
            return Err(RoomError::NotParticipant { conn, room: key });
        }
        if room.is_host(conn) {
            return Ok(None);
        }
        Ok(Some(room.host))
    }

    /// Host only: checks that a sync reply can go to `to`.
    ///
    /// # Errors
    /// The host-gate errors, or [`RoomError::TargetNotFound`] if `to`
    /// isn't in the room.
    pub fn sync_reply_target(
        &mut self,
        conn: ConnectionId,
        room_name: &str,
        to: ConnectionId,
    ) -> Result<ConnectionId, RoomError> {
        let room = self.host_gate(conn, room_name)?;
        if !room.contains(to) {
            return Err(RoomError::TargetNotFound {
                target: to,
                room: room_name.to_owned(),
            });
        }
        Ok(to)
    }

    /// All participants of a media room in join order, or `None` if it
    /// doesn't exist.
    pub fn members(&self, room_name: &str) -> Option<Vec<ConnectionId>> {
        self.get(room_name).map(MediaRoom::member_ids)
    }

    /// Looks up a media room by its client-facing name.
    pub fn get(&self, room_name: &str) -> Option<&MediaRoom> {
        self.rooms.get(&MediaRoomKey::new(room_name))
    }

    /// The media room `conn` is currently in.
    pub fn room_of(&self, conn: ConnectionId) -> Option<&MediaRoomKey> {
        self.member_rooms.get(&conn)
    }

    /// Returns the number of active media rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
