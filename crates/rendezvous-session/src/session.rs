//! Session types: the server's record of one live connection.

use std::time::Instant;

use rendezvous_protocol::{ConnectionId, ServerEvent};
use tokio::sync::mpsc;

/// Sending half of a connection's outbound queue.
///
/// Unbounded on purpose: the relay pushes while holding its state lock
/// and must never wait on a slow client. A writer task per connection
/// drains the receiving half onto the socket.
pub type Outbox = mpsc::UnboundedSender<ServerEvent>;

/// Display name used when a client never picked one: `User` plus the
/// connection number.
pub fn default_display_name(id: ConnectionId) -> String {
    format!("User{}", id.into_inner())
}

/// A single connection's session.
///
/// Created when the transport accepts a connection, removed when it
/// closes. Nothing about it survives the connection.
#[derive(Debug, Clone)]
pub struct Session {
    /// Which connection this session belongs to.
    pub conn_id: ConnectionId,

    /// Name the client chose, if any. Read through
    /// [`display_name`](Self::display_name) to get the defaulted value.
    pub(crate) display_name: Option<String>,

    /// Where events for this connection are queued.
    pub(crate) outbox: Outbox,

    /// When the connection was accepted.
    pub connected_at: Instant,
}

impl Session {
    pub(crate) fn new(conn_id: ConnectionId, outbox: Outbox) -> Self {
        Self {
            conn_id,
            display_name: None,
            outbox,
            connected_at: Instant::now(),
        }
    }

    /// The chosen display name, or the id-derived default.
    pub fn display_name(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| default_display_name(self.conn_id))
    }

    /// Queues an event for this connection.
    ///
    /// Returns `false` if the writer side is already gone (the client is
    /// disconnecting); the event is dropped.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.outbox.send(event).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_display_name_uses_connection_number() {
        assert_eq!(default_display_name(ConnectionId::new(17)), "User17");
    }

    #[test]
    fn test_display_name_falls_back_to_default() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut session = Session::new(ConnectionId::new(3), tx);
        assert_eq!(session.display_name(), "User3");

        session.display_name = Some("Ana".into());
        assert_eq!(session.display_name(), "Ana");
    }

    #[test]
    fn test_send_after_receiver_dropped_returns_false() {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session::new(ConnectionId::new(1), tx);
        drop(rx);
        assert!(!session.send(ServerEvent::error("gone")));
    }
}
