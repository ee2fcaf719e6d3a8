//! WebSocket transport using `tokio-tungstenite`.
//!
//! Guests connect with [`WebSocketTransport::connect`]; hosts accept with a
//! [`WebSocketListener`] bound to one room. The listener only upgrades
//! requests for the room path `/<endpoint name>` (see
//! [`RoomCode::endpoint_name`]) and answers anything else with 404, which a
//! connecting guest reports as [`BingoError::PeerUnavailable`].
//!
//! After the upgrade the guest sends its [`PlayerId`] as the first text frame;
//! the listener reads it and yields an [`IncomingConnection`].
//!
//! # Feature gate
//!
//! Only available with the `transport-websocket` feature (on by default).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), bingo_link::BingoError> {
//! use bingo_link::protocol::PlayerId;
//! use bingo_link::room::RoomCode;
//! use bingo_link::transports::websocket::{room_url, WebSocketTransport};
//!
//! let room = RoomCode::parse("42")?;
//! let url = room_url("ws://192.168.1.20:9000", &room);
//! let transport = WebSocketTransport::connect(&url, &PlayerId::random()).await?;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::MaybeTlsStream;
use tracing::{debug, info, warn};

use crate::error::BingoError;
use crate::protocol::PlayerId;
use crate::room::RoomCode;
use crate::transport::{IncomingConnection, Transport};

/// How long an upgraded connection has to announce its peer id.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Underlying WebSocket stream, shared by both sides.
pub type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<TcpStream>>;

/// URL of `room` on the host reachable at `base` (e.g. `ws://10.0.0.2:9000`).
pub fn room_url(base: &str, room: &RoomCode) -> String {
    format!("{}/{}", base.trim_end_matches('/'), room.endpoint_name())
}

/// A [`Transport`] over one WebSocket connection.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) is cancel-safe: dropping it before completion
/// does not consume a message.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Connect to a room URL and announce `peer_id`.
    ///
    /// # Errors
    ///
    /// [`BingoError::PeerUnavailable`] if nothing listens at `url` or the
    /// host does not serve that room, [`BingoError::Io`] for other connection
    /// failures, or a send error if the handshake frame cannot be written.
    pub async fn connect(url: &str, peer_id: &PlayerId) -> Result<Self, BingoError> {
        debug!(%url, %peer_id, "connecting to room");

        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| connect_error(url, e))?;

        let mut transport = Self::from_stream(stream);
        transport.send(peer_id.to_string()).await?;
        info!(%url, "connected to room");
        Ok(transport)
    }

    /// [`connect`](Self::connect) with a deadline.
    ///
    /// # Errors
    ///
    /// [`BingoError::Timeout`] if the deadline elapses, or any error
    /// [`connect`](Self::connect) returns.
    pub async fn connect_with_timeout(
        url: &str,
        peer_id: &PlayerId,
        timeout: Duration,
    ) -> Result<Self, BingoError> {
        tokio::time::timeout(timeout, Self::connect(url, peer_id))
            .await
            .map_err(|_| BingoError::Timeout)?
    }

    /// Wrap an already established stream. No handshake frame is sent.
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

fn connect_error(url: &str, e: tokio_tungstenite::tungstenite::Error) -> BingoError {
    use tokio_tungstenite::tungstenite::Error as WsError;

    match e {
        WsError::Http(response) if response.status() == StatusCode::NOT_FOUND => {
            BingoError::PeerUnavailable(url.to_string())
        }
        WsError::Io(io) if io.kind() == std::io::ErrorKind::ConnectionRefused => {
            BingoError::PeerUnavailable(url.to_string())
        }
        WsError::Io(io) => BingoError::Io(io),
        other => BingoError::Io(std::io::Error::other(other)),
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), BingoError> {
        if self.closed {
            return Err(BingoError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| BingoError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, BingoError>> {
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => return Some(Err(BingoError::TransportReceive(e.to_string()))),
                None => return None,
            };

            match msg {
                Message::Text(text) => return Some(Ok(text.to_string())),
                Message::Close(frame) => {
                    debug!(?frame, "received WebSocket close frame");
                    return None;
                }
                // tungstenite queues the pong itself.
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Binary(_) => warn!("unexpected binary WebSocket frame, skipping"),
                Message::Frame(_) => debug!("raw WebSocket frame, skipping"),
            }
        }
    }

    async fn close(&mut self) -> Result<(), BingoError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| BingoError::TransportSend(e.to_string()))
    }
}

// ── Host side ───────────────────────────────────────────────────────

/// Accepts guest connections for one room.
#[derive(Debug)]
pub struct WebSocketListener {
    listener: TcpListener,
    path: String,
}

impl WebSocketListener {
    /// Bind a listener for `room`.
    ///
    /// # Errors
    ///
    /// [`BingoError::EndpointInUse`] if the address is taken, otherwise
    /// [`BingoError::Io`].
    pub async fn bind(addr: impl ToSocketAddrs, room: &RoomCode) -> Result<Self, BingoError> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                BingoError::EndpointInUse(room.endpoint_name())
            } else {
                BingoError::Io(e)
            }
        })?;
        let path = format!("/{}", room.endpoint_name());
        info!(addr = ?listener.local_addr().ok(), %path, "listening for guests");
        Ok(Self { listener, path })
    }

    /// # Errors
    ///
    /// Returns [`BingoError::Io`] if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr, BingoError> {
        Ok(self.listener.local_addr()?)
    }

    /// Full `ws://` URL guests should connect to.
    ///
    /// # Errors
    ///
    /// Returns [`BingoError::Io`] if the socket address cannot be read.
    pub fn url(&self) -> Result<String, BingoError> {
        Ok(format!("ws://{}{}", self.local_addr()?, self.path))
    }

    /// Accept the next guest that completes the handshake.
    ///
    /// Connections that ask for another room or never announce an id are
    /// dropped and the next one is awaited.
    ///
    /// # Errors
    ///
    /// Returns [`BingoError::Io`] if accepting on the socket fails.
    pub async fn accept(&self) -> Result<IncomingConnection, BingoError> {
        loop {
            let (tcp, addr) = self.listener.accept().await?;
            match handshake(tcp, &self.path).await {
                Ok(connection) => return Ok(connection),
                Err(e) => warn!(%addr, "rejected connection: {e}"),
            }
        }
    }

    /// Run the accept loop in the background and feed every accepted guest
    /// into the returned channel, ready for
    /// [`HostNode::start`](crate::host::HostNode::start).
    ///
    /// Handshakes run concurrently. The loop stops once the receiver is
    /// dropped.
    pub fn into_incoming(self) -> mpsc::Receiver<IncomingConnection> {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = tx.closed() => break,
                    accepted = self.listener.accept() => match accepted {
                        Ok((tcp, addr)) => {
                            let tx = tx.clone();
                            let path = self.path.clone();
                            tokio::spawn(async move {
                                match handshake(tcp, &path).await {
                                    Ok(connection) => {
                                        if tx.send(connection).await.is_err() {
                                            debug!(%addr, "host gone, dropping connection");
                                        }
                                    }
                                    Err(e) => warn!(%addr, "rejected connection: {e}"),
                                }
                            });
                        }
                        Err(e) => {
                            warn!("accept failed: {e}");
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
            }
            debug!("accept loop exited");
        });
        rx
    }
}

/// Upgrade `tcp` if it asks for `path`, then read the announced peer id.
async fn handshake(tcp: TcpStream, path: &str) -> Result<IncomingConnection, BingoError> {
    let expected = path.to_string();
    let check_path = move |request: &Request, response: Response| {
        if request.uri().path() == expected {
            Ok(response)
        } else {
            let mut rejection = ErrorResponse::new(Some("Room not found".to_string()));
            *rejection.status_mut() = StatusCode::NOT_FOUND;
            Err(rejection)
        }
    };

    let stream = tokio_tungstenite::accept_hdr_async(MaybeTlsStream::Plain(tcp), check_path)
        .await
        .map_err(|e| BingoError::TransportReceive(e.to_string()))?;
    let mut transport = WebSocketTransport::from_stream(stream);

    let announced = tokio::time::timeout(HANDSHAKE_TIMEOUT, transport.recv())
        .await
        .map_err(|_| BingoError::Timeout)?;
    match announced {
        Some(Ok(id)) if !id.trim().is_empty() => {
            let peer_id = PlayerId::new(id.trim());
            debug!(%peer_id, "guest handshake complete");
            Ok(IncomingConnection::new(peer_id, transport))
        }
        Some(Ok(_)) => Err(BingoError::TransportReceive("empty peer id".into())),
        Some(Err(e)) => Err(e),
        None => Err(BingoError::TransportClosed),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    fn room() -> RoomCode {
        RoomCode::parse("42").unwrap()
    }

    #[test]
    fn websocket_transport_is_send_and_debug() {
        fn assert_send_debug<T: Send + std::fmt::Debug>() {}
        assert_send_debug::<WebSocketTransport>();
    }

    #[test]
    fn room_url_appends_endpoint_name() {
        assert_eq!(
            room_url("ws://127.0.0.1:9000/", &room()),
            "ws://127.0.0.1:9000/bingo-pwa-42"
        );
    }

    #[tokio::test]
    async fn connect_to_closed_port_is_peer_unavailable() {
        // Bind then drop to get a port nobody listens on.
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        let err = WebSocketTransport::connect(&format!("ws://{addr}/bingo-pwa-42"), &PlayerId::new("g"))
            .await
            .unwrap_err();
        assert!(matches!(err, BingoError::PeerUnavailable(_)), "{err:?}");
    }

    #[tokio::test]
    async fn wrong_room_is_peer_unavailable() {
        let listener = WebSocketListener::bind("127.0.0.1:0", &room()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let url = room_url(&format!("ws://{addr}"), &RoomCode::parse("17").unwrap());
        let err = WebSocketTransport::connect(&url, &PlayerId::new("g"))
            .await
            .unwrap_err();
        assert!(matches!(err, BingoError::PeerUnavailable(_)), "{err:?}");
    }

    #[tokio::test]
    async fn bind_twice_is_endpoint_in_use() {
        let first = WebSocketListener::bind("127.0.0.1:0", &room()).await.unwrap();
        let addr = first.local_addr().unwrap();
        let err = WebSocketListener::bind(addr, &room()).await.unwrap_err();
        assert!(matches!(err, BingoError::EndpointInUse(name) if name == "bingo-pwa-42"));
    }

    #[tokio::test]
    async fn handshake_announces_peer_id_and_carries_text() {
        let listener = WebSocketListener::bind("127.0.0.1:0", &room()).await.unwrap();
        let url = listener.url().unwrap();
        let accept = tokio::spawn(async move { listener.accept().await });

        let mut guest = WebSocketTransport::connect(&url, &PlayerId::new("guest-1"))
            .await
            .unwrap();
        let mut incoming = accept.await.unwrap().unwrap();
        assert_eq!(incoming.peer_id.as_str(), "guest-1");

        guest.send(r#"{"type":"READY"}"#.into()).await.unwrap();
        assert_eq!(
            incoming.transport.recv().await.unwrap().unwrap(),
            r#"{"type":"READY"}"#
        );

        incoming.transport.close().await.unwrap();
        assert!(matches!(guest.recv().await, None | Some(Err(_))));
    }

    #[tokio::test]
    async fn into_incoming_yields_connections() {
        let listener = WebSocketListener::bind("127.0.0.1:0", &room()).await.unwrap();
        let url = listener.url().unwrap();
        let mut incoming = listener.into_incoming();

        let _a = WebSocketTransport::connect(&url, &PlayerId::new("a")).await.unwrap();
        let _b = WebSocketTransport::connect(&url, &PlayerId::new("b")).await.unwrap();

        let mut ids = vec![
            incoming.recv().await.unwrap().peer_id,
            incoming.recv().await.unwrap().peer_id,
        ];
        ids.sort();
        assert_eq!(ids, vec![PlayerId::new("a"), PlayerId::new("b")]);
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let listener = WebSocketListener::bind("127.0.0.1:0", &room()).await.unwrap();
        let url = listener.url().unwrap();
        tokio::spawn(async move {
            if let Ok(mut conn) = listener.accept().await {
                while let Some(Ok(_)) = conn.transport.recv().await {}
            }
        });

        let mut transport = WebSocketTransport::connect(&url, &PlayerId::new("g"))
            .await
            .unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert!(matches!(
            transport.send("late".into()).await,
            Err(BingoError::TransportClosed)
        ));
    }
}
