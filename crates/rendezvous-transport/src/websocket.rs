//! WebSocket transport served through an `axum` router.
//!
//! The router owns the listener. Every TCP connection is driven by its own
//! task inside `axum::serve`, so a socket that never finishes its request
//! only ever holds up itself. Upgraded sockets are handed to
//! [`WebSocketTransport::accept`] through a channel.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type Incoming = mpsc::UnboundedSender<WebSocketConnection>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
///
/// The same port also answers `GET /health`; those requests never surface
/// as connections.
pub struct WebSocketTransport {
    local_addr: SocketAddr,
    incoming: mpsc::UnboundedReceiver<WebSocketConnection>,
    server: JoinHandle<()>,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address and starts
    /// serving it in the background.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        let local_addr =
            listener.local_addr().map_err(TransportError::AcceptFailed)?;

        let (tx, incoming) = mpsc::unbounded_channel();
        let app = build_routes(tx);

        let server = tokio::spawn(async move {
            let make_service =
                app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                tracing::error!(error = %e, "WebSocket listener stopped");
            }
        });

        tracing::info!(%local_addr, "WebSocket transport listening");
        Ok(Self {
            local_addr,
            incoming,
            server,
        })
    }

    /// Returns the address the listener is actually bound to.
    ///
    /// Useful when binding to port 0 and letting the OS pick.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        Ok(self.local_addr)
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        self.incoming.recv().await.ok_or(TransportError::Closed)
    }
}

/// Health check and WebSocket upgrade on the same port.
///
/// Any path other than `/health` is treated as an upgrade request, so a
/// plain HTTP request there gets the extractor's rejection.
fn build_routes(incoming: Incoming) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .fallback(upgrade)
        .layer(TraceLayer::new_for_http())
        .with_state(incoming)
}

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
}

async fn health_check() -> Json<HealthStatus> {
    Json(HealthStatus { status: "OK" })
}

async fn upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    State(incoming): State<Incoming>,
) -> Response {
    ws.on_failed_upgrade(move |error| {
        tracing::debug!(%peer_addr, %error, "WebSocket upgrade failed");
    })
    .on_upgrade(move |socket| async move {
        let conn = WebSocketConnection::new(socket, peer_addr);
        tracing::debug!(id = %conn.id, %peer_addr, "accepted WebSocket connection");
        if incoming.send(conn).is_err() {
            tracing::debug!(%peer_addr, "transport dropped, closing socket");
        }
    })
}

/// A single WebSocket connection.
///
/// The socket is split into independent write and read halves so a
/// writer task can push relayed events while the reader is parked in
/// [`recv`](Connection::recv).
pub struct WebSocketConnection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    sink: Mutex<SplitSink<WebSocket, Message>>,
    stream: Mutex<SplitStream<WebSocket>>,
}

impl WebSocketConnection {
    fn new(socket: WebSocket, peer_addr: SocketAddr) -> Self {
        let id =
            ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        let (sink, stream) = socket.split();
        Self {
            id,
            peer_addr,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }

    /// Returns the remote address of the client.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    /// Sends a frame. UTF-8 payloads go out as text frames (what browser
    /// clients expect for JSON), anything else as binary.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.to_owned()),
            Err(_) => Message::Binary(data.to_vec()),
        };
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data)),
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.into_bytes()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
