//! The relay: turns one inbound event into a list of deliveries.
//!
//! [`Relay`] owns every piece of shared state (sessions, call rooms,
//! media rooms). Its two entry points are pure with respect to I/O:
//!
//! - [`Relay::handle`] — one client event → state change + deliveries
//! - [`Relay::disconnect`] — connection gone → leave every room it was in
//!
//! The caller holds the relay lock while it calls either one AND while it
//! hands the result to [`Relay::deliver`], so every client observes
//! membership changes in the order they happened.

use rendezvous_protocol::{
    ClientEvent, ConnectionId, Recipient, ServerEvent, SignalKind,
};
use rendezvous_room::{
    CallLeave, CallRoomRegistry, MediaLeave, MediaRoomRegistry, RoomError,
};
use rendezvous_session::{Outbox, SessionError, SessionManager};
use serde_json::Value;

/// One outbound event addressed to one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub to: ConnectionId,
    pub event: ServerEvent,
}

impl Delivery {
    pub fn new(to: ConnectionId, event: ServerEvent) -> Self {
        Self { to, event }
    }
}

/// Shared relay state plus the dispatch rules.
#[derive(Debug, Default)]
pub struct Relay {
    sessions: SessionManager,
    calls: CallRoomRegistry,
    media: MediaRoomRegistry,
}

impl Relay {
    /// Creates a relay with no connections and no rooms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly accepted connection and where to queue its events,
    /// then tells the client its id.
    ///
    /// # Errors
    /// [`SessionError::AlreadyConnected`] if the id is already registered.
    pub fn connect(
        &mut self,
        conn: ConnectionId,
        outbox: Outbox,
    ) -> Result<(), SessionError> {
        self.sessions
            .create(conn, outbox)?
            .send(ServerEvent::Connected { id: conn });
        tracing::info!(%conn, connections = self.sessions.len(), "client connected");
        Ok(())
    }

    /// Applies one client event and returns what must be sent.
    pub fn handle(
        &mut self,
        sender: ConnectionId,
        event: ClientEvent,
    ) -> Vec<Delivery> {
        tracing::debug!(%sender, event = event.kind(), "handling event");
        let mut out = Vec::new();

        match event {
            // -- Call rooms --
            ClientEvent::JoinRoom {
                room_name,
                display_name,
            } => self.join_call(&mut out, sender, &room_name, display_name),

            ClientEvent::LeaveRoom { room_name } => {
                if let Some(leave) = self.calls.leave(sender, &room_name) {
                    call_left(&mut out, sender, leave);
                }
            }

            ClientEvent::Offer { to, room, payload } => self.signal(
                &mut out,
                SignalKind::Offer,
                sender,
                to,
                room,
                payload,
            ),
            ClientEvent::Answer { to, room, payload } => self.signal(
                &mut out,
                SignalKind::Answer,
                sender,
                to,
                room,
                payload,
            ),
            ClientEvent::IceCandidate { to, room, payload } => self.signal(
                &mut out,
                SignalKind::IceCandidate,
                sender,
                to,
                room,
                payload,
            ),

            ClientEvent::ChatMessage {
                room,
                message,
                user_name,
            } => {
                let members = self.calls.members(&room);
                fan_out_to_room(
                    &mut out,
                    "chat-message",
                    &room,
                    members,
                    Recipient::AllExcept(sender),
                    ServerEvent::ChatMessage {
                        user_id: sender,
                        user_name,
                        message,
                    },
                );
            }

            ClientEvent::UserMediaUpdate { room, video, audio } => {
                let members = self.calls.members(&room);
                fan_out_to_room(
                    &mut out,
                    "user-media-update",
                    &room,
                    members,
                    Recipient::AllExcept(sender),
                    ServerEvent::UserMediaUpdate {
                        user_id: sender,
                        video,
                        audio,
                    },
                );
            }

            ClientEvent::UpdateDisplayName { room, display_name } => {
                self.remember_display_name(sender, &display_name);
                // Blank resets to the default name.
                let display_name = self.sessions.display_name(sender);
                let targets =
                    self.calls.update_display_name(sender, &room, &display_name);
                fan_out(
                    &mut out,
                    &targets,
                    Recipient::All,
                    &ServerEvent::UpdateDisplayName {
                        user_id: sender,
                        display_name,
                    },
                );
            }

            // -- Media rooms --
            ClientEvent::JoinMediaRoom {
                room_name,
                display_name,
            } => self.join_media(&mut out, sender, &room_name, display_name),

            ClientEvent::LeaveMediaRoom { room_name } => {
                if let Some(leave) = self.media.leave(sender, &room_name) {
                    media_left(&mut out, sender, leave);
                }
            }

            ClientEvent::MediaBecomeHost { room_name } => {
                match self.media.transfer_host(sender, &room_name) {
                    Some(change) => fan_out(
                        &mut out,
                        &change.members,
                        Recipient::All,
                        &ServerEvent::MediaHostChanged {
                            host_id: change.host,
                        },
                    ),
                    None => tracing::debug!(
                        %sender,
                        room = %room_name,
                        "host request from non-participant dropped"
                    ),
                }
            }

            ClientEvent::MediaLoad { room, media } => {
                let result = self.media.set_media(sender, &room, media.clone());
                forward_gated(
                    &mut out,
                    sender,
                    "media-load",
                    result,
                    ServerEvent::MediaLoad {
                        from: sender,
                        media,
                    },
                );
            }

            ClientEvent::MediaPlay { room, timestamp } => {
                let result = self.media.authorize_playback(sender, &room);
                forward_gated(
                    &mut out,
                    sender,
                    "media-play",
                    result,
                    ServerEvent::MediaPlay {
                        from: sender,
                        timestamp,
                    },
                );
            }

            ClientEvent::MediaPause { room } => {
                let result = self.media.authorize_playback(sender, &room);
                forward_gated(
                    &mut out,
                    sender,
                    "media-pause",
                    result,
                    ServerEvent::MediaPause { from: sender },
                );
            }

            ClientEvent::MediaQueueUpdate { room, queue } => {
                let result =
                    self.media.update_queue(sender, &room, queue.clone());
                forward_gated(
                    &mut out,
                    sender,
                    "media-queue-update",
                    result,
                    ServerEvent::MediaQueueUpdate {
                        from: sender,
                        queue,
                    },
                );
            }

            ClientEvent::MediaSyncRequest { room } => {
                match self.media.sync_request(sender, &room) {
                    Ok(Some(host)) => out.push(Delivery::new(
                        host,
                        ServerEvent::MediaSyncRequest {
                            requester_id: sender,
                        },
                    )),
                    Ok(None) => tracing::debug!(
                        %sender,
                        %room,
                        "sync request from the host itself dropped"
                    ),
                    Err(e) => reject(&mut out, sender, "media-sync-request", e),
                }
            }

            ClientEvent::MediaSyncResponse {
                room,
                to,
                timestamp,
                is_playing,
            } => match self.media.sync_reply_target(sender, &room, to) {
                Ok(requester) => out.push(Delivery::new(
                    requester,
                    ServerEvent::MediaSyncResponse {
                        from: sender,
                        timestamp,
                        is_playing,
                    },
                )),
                Err(e) => reject(&mut out, sender, "media-sync-response", e),
            },

            ClientEvent::MediaChatMessage {
                room,
                message,
                user_name,
            } => {
                let members = self.media.members(&room);
                fan_out_to_room(
                    &mut out,
                    "media-chat-message",
                    &room,
                    members,
                    Recipient::AllExcept(sender),
                    ServerEvent::MediaChatMessage {
                        user_id: sender,
                        user_name,
                        message,
                    },
                );
            }

            ClientEvent::ScreenShareStarted { room, has_audio } => {
                let members = self.media.members(&room);
                fan_out_to_room(
                    &mut out,
                    "screen-share-started",
                    &room,
                    members,
                    Recipient::AllExcept(sender),
                    ServerEvent::ScreenShareStarted {
                        user_id: sender,
                        has_audio,
                    },
                );
            }

            ClientEvent::ScreenShareStopped { room } => {
                let members = self.media.members(&room);
                fan_out_to_room(
                    &mut out,
                    "screen-share-stopped",
                    &room,
                    members,
                    Recipient::AllExcept(sender),
                    ServerEvent::ScreenShareStopped { user_id: sender },
                );
            }
        }

        out
    }

    /// Removes a closed connection from every room and forgets its session.
    ///
    /// Never fails: whatever can be cleaned up is.
    pub fn disconnect(&mut self, conn: ConnectionId) -> Vec<Delivery> {
        let mut out = Vec::new();

        for leave in self.calls.leave_all(conn) {
            call_left(&mut out, conn, leave);
        }
        for leave in self.media.leave_all(conn) {
            media_left(&mut out, conn, leave);
        }

        if let Err(e) = self.sessions.remove(conn) {
            tracing::debug!(%conn, error = %e, "disconnect of unknown session");
        }

        tracing::info!(
            %conn,
            connections = self.sessions.len(),
            notifications = out.len(),
            "client disconnected"
        );
        out
    }

    /// Queues every delivery on its target's outbox.
    ///
    /// Targets that have already gone away are skipped. Returns how many
    /// events were queued.
    pub fn deliver(&self, deliveries: Vec<Delivery>) -> usize {
        deliveries
            .into_iter()
            .filter(|d| self.sessions.deliver(d.to, d.event.clone()))
            .count()
    }

    /// Read access to the session table.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Read access to the call-room registry.
    pub fn calls(&self) -> &CallRoomRegistry {
        &self.calls
    }

    /// Read access to the media-room registry.
    pub fn media(&self) -> &MediaRoomRegistry {
        &self.media
    }

    fn remember_display_name(&mut self, conn: ConnectionId, name: &str) {
        if let Err(e) = self.sessions.set_display_name(conn, name) {
            tracing::debug!(%conn, error = %e, "display name for unknown session");
        }
    }

    fn join_call(
        &mut self,
        out: &mut Vec<Delivery>,
        sender: ConnectionId,
        room_name: &str,
        requested_name: Option<String>,
    ) {
        let name = self
            .sessions
            .preferred_display_name(sender, requested_name.as_deref());

        let join = match self.calls.join(sender, room_name, &name) {
            Ok(join) => join,
            Err(e) => {
                tracing::debug!(%sender, error = %e, "join-room failed");
                out.push(Delivery::new(
                    sender,
                    ServerEvent::error("Failed to join room"),
                ));
                return;
            }
        };
        self.remember_display_name(sender, &name);

        if let Some(previous) = join.previous {
            call_left(out, sender, previous);
        }
        out.push(Delivery::new(
            sender,
            ServerEvent::RoomJoined {
                room: join.room,
                participants: join.existing,
            },
        ));
        fan_out(
            out,
            &join.notify,
            Recipient::All,
            &ServerEvent::UserConnected {
                id: sender,
                display_name: join.display_name,
            },
        );
    }

    fn join_media(
        &mut self,
        out: &mut Vec<Delivery>,
        sender: ConnectionId,
        room_name: &str,
        requested_name: Option<String>,
    ) {
        let name = self
            .sessions
            .preferred_display_name(sender, requested_name.as_deref());

        let join = match self.media.join(sender, room_name, &name) {
            Ok(join) => join,
            Err(e) => {
                tracing::debug!(%sender, error = %e, "join-media-room failed");
                out.push(Delivery::new(
                    sender,
                    ServerEvent::error("Failed to join media room"),
                ));
                return;
            }
        };
        self.remember_display_name(sender, &name);

        if let Some(previous) = join.previous {
            media_left(out, sender, previous);
        }
        out.push(Delivery::new(
            sender,
            ServerEvent::MediaRoomJoined {
                room: join.room,
                is_host: join.joiner.is_host,
                host_id: join.host,
                participants: join.participants,
                queue: join.queue,
                current_media: join.current_media,
            },
        ));
        fan_out(
            out,
            &join.notify,
            Recipient::All,
            &ServerEvent::MediaUserJoined {
                user_id: sender,
                user: join.joiner,
            },
        );
    }

    /// Point-to-point negotiation relay. The target must be in the named
    /// call room; otherwise only the sender hears about it.
    fn signal(
        &self,
        out: &mut Vec<Delivery>,
        kind: SignalKind,
        sender: ConnectionId,
        to: ConnectionId,
        room: String,
        payload: Value,
    ) {
        match self.calls.check_target(&room, to) {
            Ok(()) => out.push(Delivery::new(
                to,
                ServerEvent::signal(kind, sender, room, payload),
            )),
            Err(e) => {
                tracing::debug!(%sender, %to, %room, %kind, "signal dropped");
                out.push(Delivery::new(
                    sender,
                    ServerEvent::error(format!("{kind} failed: {e}")),
                ));
            }
        }
    }
}

/// Pushes `event` for every member `recipient` addresses.
fn fan_out(
    out: &mut Vec<Delivery>,
    members: &[ConnectionId],
    recipient: Recipient,
    event: &ServerEvent,
) {
    out.extend(
        members
            .iter()
            .copied()
            .filter(|id| recipient.includes(*id))
            .map(|to| Delivery::new(to, event.clone())),
    );
}

/// Room-wide relay: silently dropped when the room doesn't exist.
fn fan_out_to_room(
    out: &mut Vec<Delivery>,
    kind: &str,
    room: &str,
    members: Option<Vec<ConnectionId>>,
    recipient: Recipient,
    event: ServerEvent,
) {
    match members {
        Some(members) => fan_out(out, &members, recipient, &event),
        None => tracing::debug!(kind, room, "relay to unknown room dropped"),
    }
}

fn call_left(out: &mut Vec<Delivery>, conn: ConnectionId, leave: CallLeave) {
    fan_out(
        out,
        &leave.remaining,
        Recipient::All,
        &ServerEvent::UserDisconnected { id: conn },
    );
}

/// Tells the rest of a media room that `conn` left, then announces the
/// promoted host if there is one.
fn media_left(out: &mut Vec<Delivery>, conn: ConnectionId, leave: MediaLeave) {
    fan_out(
        out,
        &leave.remaining,
        Recipient::All,
        &ServerEvent::MediaUserLeft {
            user_id: conn,
            was_host: leave.was_host,
        },
    );
    if let Some(host_id) = leave.new_host {
        fan_out(
            out,
            &leave.remaining,
            Recipient::All,
            &ServerEvent::MediaHostChanged { host_id },
        );
    }
}

/// Forwards a host-gated control to the rest of the room, or rejects it.
fn forward_gated(
    out: &mut Vec<Delivery>,
    sender: ConnectionId,
    kind: &str,
    result: Result<Vec<ConnectionId>, RoomError>,
    event: ServerEvent,
) {
    match result {
        Ok(targets) => fan_out(out, &targets, Recipient::All, &event),
        Err(e) => reject(out, sender, kind, e),
    }
}

/// Media actions against a missing room vanish; anything else earns the
/// sender an `error`.
fn reject(
    out: &mut Vec<Delivery>,
    sender: ConnectionId,
    kind: &str,
    err: RoomError,
) {
    if let RoomError::NotFound(room) = &err {
        tracing::debug!(%sender, kind, %room, "media event for unknown room dropped");
        return;
    }
    tracing::warn!(%sender, kind, error = %err, "media event rejected");
    out.push(Delivery::new(
        sender,
        ServerEvent::error(format!("{kind} rejected: {err}")),
    ));
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;

    fn cid(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    /// A relay with sessions registered for each id. The receivers are
    /// returned so the outboxes stay open.
    fn relay_with(
        ids: &[u64],
    ) -> (Relay, Vec<mpsc::UnboundedReceiver<ServerEvent>>) {
        let mut relay = Relay::new();
        let rxs = ids
            .iter()
            .map(|id| {
                let (tx, rx) = mpsc::unbounded_channel();
                relay.connect(cid(*id), tx).unwrap();
                rx
            })
            .collect();
        (relay, rxs)
    }

    fn join_call(relay: &mut Relay, id: u64, room: &str) -> Vec<Delivery> {
        relay.handle(
            cid(id),
            ClientEvent::JoinRoom {
                room_name: room.into(),
                display_name: None,
            },
        )
    }

    fn join_media(relay: &mut Relay, id: u64, room: &str) -> Vec<Delivery> {
        relay.handle(
            cid(id),
            ClientEvent::JoinMediaRoom {
                room_name: room.into(),
                display_name: Some(format!("N{id}")),
            },
        )
    }

    fn to(out: &[Delivery], id: u64) -> Vec<&ServerEvent> {
        out.iter()
            .filter(|d| d.to == cid(id))
            .map(|d| &d.event)
            .collect()
    }

    #[test]
    fn test_join_room_sends_existing_to_joiner_and_announces() {
        let (mut relay, _rx) = relay_with(&[1, 2]);
        join_call(&mut relay, 1, "r1");

        let out = join_call(&mut relay, 2, "r1");

        assert_eq!(
            to(&out, 2),
            vec![&ServerEvent::RoomJoined {
                room: "r1".into(),
                participants: vec![rendezvous_protocol::PeerInfo {
                    id: cid(1),
                    display_name: "User1".into(),
                }],
            }]
        );
        assert_eq!(
            to(&out, 1),
            vec![&ServerEvent::UserConnected {
                id: cid(2),
                display_name: "User2".into(),
            }]
        );
    }

    #[test]
    fn test_join_room_blank_name_replies_error() {
        let (mut relay, _rx) = relay_with(&[1]);

        let out = join_call(&mut relay, 1, "  ");

        assert_eq!(
            out,
            vec![Delivery::new(cid(1), ServerEvent::error("Failed to join room"))]
        );
    }

    #[test]
    fn test_join_second_room_tells_previous_room() {
        let (mut relay, _rx) = relay_with(&[1, 2]);
        join_call(&mut relay, 1, "a");
        join_call(&mut relay, 2, "a");

        let out = join_call(&mut relay, 2, "b");

        assert_eq!(
            to(&out, 1),
            vec![&ServerEvent::UserDisconnected { id: cid(2) }]
        );
        assert_eq!(relay.calls().room_of(cid(2)), Some("b"));
    }

    #[test]
    fn test_offer_to_member_is_delivered_with_sender_and_room() {
        let (mut relay, _rx) = relay_with(&[1, 2]);
        join_call(&mut relay, 1, "r1");
        join_call(&mut relay, 2, "r1");

        let out = relay.handle(
            cid(1),
            ClientEvent::Offer {
                to: cid(2),
                room: "r1".into(),
                payload: json!({ "sdp": "v=0" }),
            },
        );

        assert_eq!(
            out,
            vec![Delivery::new(
                cid(2),
                ServerEvent::Offer {
                    from: cid(1),
                    room: "r1".into(),
                    payload: json!({ "sdp": "v=0" }),
                }
            )]
        );
    }

    #[test]
    fn test_offer_to_non_member_errors_sender_only() {
        let (mut relay, _rx) = relay_with(&[1, 2]);
        join_call(&mut relay, 1, "r1");

        let out = relay.handle(
            cid(1),
            ClientEvent::Offer {
                to: cid(2),
                room: "r1".into(),
                payload: Value::Null,
            },
        );

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, cid(1));
        let ServerEvent::Error { message } = &out[0].event else {
            panic!("expected error, got {:?}", out[0].event);
        };
        assert!(message.contains("offer"));
        assert!(message.contains("conn-2"));
        assert!(message.contains("r1"));
    }

    #[test]
    fn test_chat_to_unknown_room_is_dropped() {
        let (mut relay, _rx) = relay_with(&[1]);

        let out = relay.handle(
            cid(1),
            ClientEvent::ChatMessage {
                room: "nowhere".into(),
                message: "hi".into(),
                user_name: None,
            },
        );

        assert!(out.is_empty());
    }

    #[test]
    fn test_update_display_name_broadcasts_and_updates_session() {
        let (mut relay, _rx) = relay_with(&[1, 2]);
        join_call(&mut relay, 1, "r1");
        join_call(&mut relay, 2, "r1");

        let out = relay.handle(
            cid(2),
            ClientEvent::UpdateDisplayName {
                room: "r1".into(),
                display_name: "Bea".into(),
            },
        );

        assert_eq!(
            to(&out, 1),
            vec![&ServerEvent::UpdateDisplayName {
                user_id: cid(2),
                display_name: "Bea".into(),
            }]
        );
        assert_eq!(relay.sessions().display_name(cid(2)), "Bea");
        assert_eq!(relay.calls().display_name("r1", cid(2)), Some("Bea"));
    }

    #[test]
    fn test_movie_night_scenario() {
        let (mut relay, _rx) = relay_with(&[1, 2]);
        let a_join = join_media(&mut relay, 1, "movie-night");
        assert!(matches!(
            a_join[0].event,
            ServerEvent::MediaRoomJoined { is_host: true, .. }
        ));
        join_media(&mut relay, 2, "movie-night");

        // Host selects media: B receives it.
        let out = relay.handle(
            cid(1),
            ClientEvent::MediaLoad {
                room: "movie-night".into(),
                media: json!({ "id": "x" }),
            },
        );
        assert_eq!(
            out,
            vec![Delivery::new(
                cid(2),
                ServerEvent::MediaLoad {
                    from: cid(1),
                    media: json!({ "id": "x" }),
                }
            )]
        );

        // B is not host: play never reaches A.
        let out = relay.handle(
            cid(2),
            ClientEvent::MediaPlay {
                room: "movie-night".into(),
                timestamp: Some(3.0),
            },
        );
        assert!(to(&out, 1).is_empty());
        assert!(matches!(
            to(&out, 2).as_slice(),
            [ServerEvent::Error { .. }]
        ));

        // A disconnects: B is promoted and told so.
        let out = relay.disconnect(cid(1));
        assert_eq!(
            to(&out, 2),
            vec![
                &ServerEvent::MediaUserLeft {
                    user_id: cid(1),
                    was_host: true,
                },
                &ServerEvent::MediaHostChanged { host_id: cid(2) },
            ]
        );
        let room = relay.media().get("movie-night").unwrap();
        assert_eq!(room.host(), cid(2));
        assert_eq!(room.len(), 1);
    }

    #[test]
    fn test_media_control_for_unknown_room_is_silent() {
        let (mut relay, _rx) = relay_with(&[1]);

        let out = relay.handle(
            cid(1),
            ClientEvent::MediaPause {
                room: "ghost".into(),
            },
        );

        assert!(out.is_empty());
    }

    #[test]
    fn test_sync_request_and_response_round_trip_through_host() {
        let (mut relay, _rx) = relay_with(&[1, 2]);
        join_media(&mut relay, 1, "m");
        join_media(&mut relay, 2, "m");

        let out = relay.handle(
            cid(2),
            ClientEvent::MediaSyncRequest { room: "m".into() },
        );
        assert_eq!(
            out,
            vec![Delivery::new(
                cid(1),
                ServerEvent::MediaSyncRequest {
                    requester_id: cid(2)
                }
            )]
        );

        let out = relay.handle(
            cid(1),
            ClientEvent::MediaSyncResponse {
                room: "m".into(),
                to: cid(2),
                timestamp: Some(42.5),
                is_playing: true,
            },
        );
        assert_eq!(
            out,
            vec![Delivery::new(
                cid(2),
                ServerEvent::MediaSyncResponse {
                    from: cid(1),
                    timestamp: Some(42.5),
                    is_playing: true,
                }
            )]
        );
    }

    #[test]
    fn test_become_host_announces_to_whole_room() {
        let (mut relay, _rx) = relay_with(&[1, 2]);
        join_media(&mut relay, 1, "m");
        join_media(&mut relay, 2, "m");

        let out = relay.handle(
            cid(2),
            ClientEvent::MediaBecomeHost {
                room_name: "m".into(),
            },
        );

        let changed = ServerEvent::MediaHostChanged { host_id: cid(2) };
        assert_eq!(to(&out, 1), vec![&changed]);
        assert_eq!(to(&out, 2), vec![&changed]);
    }

    #[test]
    fn test_disconnect_sole_call_member_deletes_room() {
        let (mut relay, _rx) = relay_with(&[3]);
        join_call(&mut relay, 3, "r1");

        let out = relay.disconnect(cid(3));

        assert!(out.is_empty());
        assert!(!relay.calls().contains_room("r1"));
        assert!(relay.sessions().is_empty());
    }

    #[test]
    fn test_deliver_skips_departed_targets() {
        let (mut relay, mut rxs) = relay_with(&[1, 2]);
        relay.disconnect(cid(2));

        let queued = relay.deliver(vec![
            Delivery::new(cid(1), ServerEvent::error("one")),
            Delivery::new(cid(2), ServerEvent::error("two")),
        ]);

        assert_eq!(queued, 1);
        assert_eq!(
            rxs[0].try_recv().ok(),
            Some(ServerEvent::Connected { id: cid(1) })
        );
        assert_eq!(rxs[0].try_recv().ok(), Some(ServerEvent::error("one")));
    }

    // =====================================================================
    // Display names
    // =====================================================================

    #[test]
    fn test_failed_join_keeps_previous_display_name() {
        let (mut relay, _rx) = relay_with(&[1]);

        let out = relay.handle(
            cid(1),
            ClientEvent::JoinRoom {
                room_name: " ".into(),
                display_name: Some("Eve".into()),
            },
        );
        assert_eq!(
            out,
            vec![Delivery::new(cid(1), ServerEvent::error("Failed to join room"))]
        );
        let out = relay.handle(
            cid(1),
            ClientEvent::JoinMediaRoom {
                room_name: String::new(),
                display_name: Some("Eve".into()),
            },
        );
        assert_eq!(
            out,
            vec![Delivery::new(
                cid(1),
                ServerEvent::error("Failed to join media room")
            )]
        );

        assert_eq!(relay.sessions().display_name(cid(1)), "User1");
    }

    #[test]
    fn test_join_with_name_is_remembered_for_later_joins() {
        let (mut relay, _rx) = relay_with(&[1]);
        relay.handle(
            cid(1),
            ClientEvent::JoinRoom {
                room_name: "r1".into(),
                display_name: Some(" Ana ".into()),
            },
        );

        let out = join_call(&mut relay, 1, "r2");

        assert_eq!(relay.sessions().display_name(cid(1)), "Ana");
        assert_eq!(relay.calls().display_name("r2", cid(1)), Some("Ana"));
        assert!(matches!(
            to(&out, 1).as_slice(),
            [ServerEvent::RoomJoined { .. }]
        ));
    }

    #[test]
    fn test_blank_rename_falls_back_to_default_name() {
        let (mut relay, _rx) = relay_with(&[1, 2]);
        join_call(&mut relay, 1, "r1");
        join_call(&mut relay, 2, "r1");
        relay.handle(
            cid(2),
            ClientEvent::UpdateDisplayName {
                room: "r1".into(),
                display_name: "Bea".into(),
            },
        );

        let out = relay.handle(
            cid(2),
            ClientEvent::UpdateDisplayName {
                room: "r1".into(),
                display_name: "".into(),
            },
        );

        assert_eq!(
            to(&out, 1),
            vec![&ServerEvent::UpdateDisplayName {
                user_id: cid(2),
                display_name: "User2".into(),
            }]
        );
        assert_eq!(relay.sessions().display_name(cid(2)), "User2");

        // A later join without a name uses the default too.
        join_call(&mut relay, 2, "r2");
        assert_eq!(relay.calls().display_name("r2", cid(2)), Some("User2"));
    }

    // =====================================================================
    // Call room relays
    // =====================================================================

    #[test]
    fn test_user_media_update_reaches_others_only() {
        let (mut relay, _rx) = relay_with(&[1, 2, 3]);
        for id in 1..=3 {
            join_call(&mut relay, id, "r1");
        }

        let out = relay.handle(
            cid(2),
            ClientEvent::UserMediaUpdate {
                room: "r1".into(),
                video: false,
                audio: true,
            },
        );

        let update = ServerEvent::UserMediaUpdate {
            user_id: cid(2),
            video: false,
            audio: true,
        };
        assert_eq!(
            out,
            vec![
                Delivery::new(cid(1), update.clone()),
                Delivery::new(cid(3), update),
            ]
        );
    }

    #[test]
    fn test_leave_room_notifies_remaining_and_deletes_when_empty() {
        let (mut relay, _rx) = relay_with(&[1, 2]);
        join_call(&mut relay, 1, "r1");
        join_call(&mut relay, 2, "r1");

        let out = relay.handle(
            cid(1),
            ClientEvent::LeaveRoom {
                room_name: "r1".into(),
            },
        );
        assert_eq!(
            out,
            vec![Delivery::new(
                cid(2),
                ServerEvent::UserDisconnected { id: cid(1) }
            )]
        );
        assert_eq!(relay.calls().members("r1"), Some(vec![cid(2)]));

        let out = relay.handle(
            cid(2),
            ClientEvent::LeaveRoom {
                room_name: "r1".into(),
            },
        );
        assert!(out.is_empty());
        assert!(!relay.calls().contains_room("r1"));
    }

    #[test]
    fn test_leave_room_not_joined_is_ignored() {
        let (mut relay, _rx) = relay_with(&[1, 2]);
        join_call(&mut relay, 1, "r1");

        let out = relay.handle(
            cid(2),
            ClientEvent::LeaveRoom {
                room_name: "r1".into(),
            },
        );

        assert!(out.is_empty());
        assert_eq!(relay.calls().members("r1"), Some(vec![cid(1)]));
    }

    // =====================================================================
    // Media room relays
    // =====================================================================

    #[test]
    fn test_media_pause_from_host_forwards_with_sender() {
        let (mut relay, _rx) = relay_with(&[1, 2, 3]);
        for id in 1..=3 {
            join_media(&mut relay, id, "m");
        }

        let out = relay.handle(cid(1), ClientEvent::MediaPause { room: "m".into() });

        let pause = ServerEvent::MediaPause { from: cid(1) };
        assert_eq!(
            out,
            vec![
                Delivery::new(cid(2), pause.clone()),
                Delivery::new(cid(3), pause),
            ]
        );
    }

    #[test]
    fn test_media_queue_update_from_host_is_stored_and_forwarded() {
        let (mut relay, _rx) = relay_with(&[1, 2]);
        join_media(&mut relay, 1, "m");
        join_media(&mut relay, 2, "m");
        let queue = vec![json!({ "id": "a" }), json!({ "id": "b" })];

        let out = relay.handle(
            cid(1),
            ClientEvent::MediaQueueUpdate {
                room: "m".into(),
                queue: queue.clone(),
            },
        );

        assert_eq!(
            out,
            vec![Delivery::new(
                cid(2),
                ServerEvent::MediaQueueUpdate {
                    from: cid(1),
                    queue: queue.clone(),
                }
            )]
        );
        assert_eq!(relay.media().get("m").unwrap().queue(), queue.as_slice());
    }

    #[test]
    fn test_media_chat_from_non_host_reaches_others() {
        let (mut relay, _rx) = relay_with(&[1, 2, 3]);
        for id in 1..=3 {
            join_media(&mut relay, id, "m");
        }

        let out = relay.handle(
            cid(3),
            ClientEvent::MediaChatMessage {
                room: "m".into(),
                message: "popcorn?".into(),
                user_name: Some("N3".into()),
            },
        );

        let chat = ServerEvent::MediaChatMessage {
            user_id: cid(3),
            user_name: Some("N3".into()),
            message: "popcorn?".into(),
        };
        assert_eq!(
            out,
            vec![
                Delivery::new(cid(1), chat.clone()),
                Delivery::new(cid(2), chat),
            ]
        );
    }

    #[test]
    fn test_media_chat_to_unknown_room_is_dropped() {
        let (mut relay, _rx) = relay_with(&[1]);

        let out = relay.handle(
            cid(1),
            ClientEvent::MediaChatMessage {
                room: "ghost".into(),
                message: "anyone?".into(),
                user_name: None,
            },
        );

        assert!(out.is_empty());
    }

    #[test]
    fn test_screen_share_events_pass_through_without_state() {
        let (mut relay, _rx) = relay_with(&[1, 2]);
        join_media(&mut relay, 1, "m");
        join_media(&mut relay, 2, "m");

        let out = relay.handle(
            cid(2),
            ClientEvent::ScreenShareStarted {
                room: "m".into(),
                has_audio: true,
            },
        );
        assert_eq!(
            out,
            vec![Delivery::new(
                cid(1),
                ServerEvent::ScreenShareStarted {
                    user_id: cid(2),
                    has_audio: true,
                }
            )]
        );

        let out = relay.handle(
            cid(2),
            ClientEvent::ScreenShareStopped { room: "m".into() },
        );
        assert_eq!(
            out,
            vec![Delivery::new(
                cid(1),
                ServerEvent::ScreenShareStopped { user_id: cid(2) }
            )]
        );

        let room = relay.media().get("m").unwrap();
        assert_eq!(room.host(), cid(1));
        assert!(room.current_media().is_none());
        assert!(room.queue().is_empty());
    }

    #[test]
    fn test_leave_media_room_by_host_promotes_earliest_joiner() {
        let (mut relay, _rx) = relay_with(&[1, 2, 3]);
        for id in 1..=3 {
            join_media(&mut relay, id, "m");
        }

        let out = relay.handle(
            cid(1),
            ClientEvent::LeaveMediaRoom {
                room_name: "m".into(),
            },
        );

        let left = ServerEvent::MediaUserLeft {
            user_id: cid(1),
            was_host: true,
        };
        let changed = ServerEvent::MediaHostChanged { host_id: cid(2) };
        assert_eq!(
            out,
            vec![
                Delivery::new(cid(2), left.clone()),
                Delivery::new(cid(3), left),
                Delivery::new(cid(2), changed.clone()),
                Delivery::new(cid(3), changed),
            ]
        );
        assert_eq!(relay.media().get("m").unwrap().host(), cid(2));
    }

    #[test]
    fn test_leave_media_room_by_guest_keeps_host() {
        let (mut relay, _rx) = relay_with(&[1, 2]);
        join_media(&mut relay, 1, "m");
        join_media(&mut relay, 2, "m");

        let out = relay.handle(
            cid(2),
            ClientEvent::LeaveMediaRoom {
                room_name: "m".into(),
            },
        );

        assert_eq!(
            out,
            vec![Delivery::new(
                cid(1),
                ServerEvent::MediaUserLeft {
                    user_id: cid(2),
                    was_host: false,
                }
            )]
        );
        assert_eq!(relay.media().get("m").unwrap().host(), cid(1));
    }
}
