//! Per-connection handler: outbound writer, inbound read loop, cleanup.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register the session with an outbox, spawn the writer task
//!   2. Loop: receive frames → decode → relay under the lock → deliver
//!   3. On close (or panic) run the disconnect cleanup

use std::sync::Arc;

use rendezvous_protocol::{ClientEvent, Codec, ConnectionId, ServerEvent};
use rendezvous_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::server::ServerState;
use crate::{Delivery, RendezvousError};

/// Drop guard that removes a connection from every room when the handler
/// exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async lock.
struct DisconnectGuard<C: Codec> {
    conn_id: ConnectionId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for DisconnectGuard<C> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let relay = Arc::clone(&self.state.relay);
        tokio::spawn(async move {
            let mut relay = relay.lock().await;
            let out = relay.disconnect(conn_id);
            relay.deliver(out);
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), RendezvousError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let (outbox, rx) = mpsc::unbounded_channel();
    state.relay.lock().await.connect(conn_id, outbox)?;
    let _guard = DisconnectGuard {
        conn_id,
        state: Arc::clone(&state),
    };

    // Ends once the session (the only sender) is removed and the queue
    // is drained, or when the socket refuses a write.
    let writer = Arc::clone(&conn);
    let writer_state = Arc::clone(&state);
    tokio::spawn(async move {
        if let Err(e) = write_outbox(writer, rx, writer_state).await {
            tracing::debug!(%conn_id, error = %e, "writer stopped");
        }
    });

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(%conn_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        let event: ClientEvent = match state.codec.decode(&data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode event");
                state.relay.lock().await.deliver(vec![Delivery::new(
                    conn_id,
                    ServerEvent::error(format!("invalid message: {e}")),
                )]);
                continue;
            }
        };

        let mut relay = state.relay.lock().await;
        let out = relay.handle(conn_id, event);
        relay.deliver(out);
    }

    // _guard drops here → disconnect cleanup fires.
    Ok(())
}

/// Drains a connection's outbox onto its socket.
///
/// Stops at the first frame that cannot be encoded or written.
async fn write_outbox<C: Codec>(
    conn: Arc<WebSocketConnection>,
    mut rx: mpsc::UnboundedReceiver<ServerEvent>,
    state: Arc<ServerState<C>>,
) -> Result<(), RendezvousError> {
    while let Some(event) = rx.recv().await {
        let bytes = state.codec.encode(&event)?;
        conn.send(&bytes).await?;
    }
    tracing::debug!(conn_id = %conn.id(), "writer finished");
    Ok(())
}
