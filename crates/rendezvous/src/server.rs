//! `RendezvousServer` builder and server loop.
//!
//! This is the entry point for running the relay. It ties together all
//! the layers: transport → protocol → relay (sessions + rooms).

use std::sync::Arc;

use rendezvous_protocol::{Codec, JsonCodec};
use rendezvous_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::{Relay, RendezvousError, ServerConfig};

/// Shared server state passed to each connection handler task.
///
/// One lock guards the whole relay, so "join then check if first" and
/// "leave then check if empty" never interleave across connections.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) relay: Arc<Mutex<Relay>>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a relay server.
///
/// # Example
///
/// ```rust,no_run
/// use rendezvous::prelude::*;
///
/// # async fn start() -> Result<(), RendezvousError> {
/// let server = RendezvousServer::builder()
///     .config(ServerConfig::from_env()?)
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct RendezvousServerBuilder {
    config: ServerConfig,
    bind_addr: Option<String>,
}

impl RendezvousServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            bind_addr: None,
        }
    }

    /// Sets host and port from a [`ServerConfig`].
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds to an explicit `host:port`, overriding the config.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = Some(addr.to_string());
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<RendezvousServer<JsonCodec>, RendezvousError> {
        let addr = self
            .bind_addr
            .unwrap_or_else(|| self.config.bind_addr());
        let transport = WebSocketTransport::bind(&addr).await?;

        let state = Arc::new(ServerState {
            relay: Arc::new(Mutex::new(Relay::new())),
            codec: JsonCodec,
        });

        Ok(RendezvousServer { transport, state })
    }
}

impl Default for RendezvousServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound relay server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RendezvousServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl RendezvousServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> RendezvousServerBuilder {
        RendezvousServerBuilder::new()
    }
}

impl<C: Codec> RendezvousServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Handle to the relay state, for inspection.
    pub fn relay(&self) -> Arc<Mutex<Relay>> {
        Arc::clone(&self.state.relay)
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// The transport completes handshakes on its own per-socket tasks, so
    /// a slow client never delays the next one. Returns once the transport
    /// stops delivering connections.
    pub async fn run(mut self) -> Result<(), RendezvousError> {
        tracing::info!(addr = ?self.local_addr().ok(), "rendezvous relay running");

        loop {
            let conn = match self.transport.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed, stopping");
                    return Err(e.into());
                }
            };

            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(conn, state).await {
                    tracing::debug!(error = %e, "connection ended with error");
                }
            });
        }
    }
}
