//! Error types for the session layer.

use rendezvous_protocol::ConnectionId;

/// Errors that can occur during session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given connection.
    /// Either it was never registered or it already disconnected.
    #[error("session not found for {0}")]
    NotFound(ConnectionId),

    /// A session is already registered under this connection id.
    /// Ids are process-unique, so this indicates a wiring bug upstream.
    #[error("{0} already has an active session")]
    AlreadyConnected(ConnectionId),
}
