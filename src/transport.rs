//! Transport abstraction for room traffic.
//!
//! The [`Transport`] trait is a bidirectional text message channel between a
//! guest and the host. Every message is one JSON object, so implementations
//! handle framing themselves (WebSocket frames, in-process channels, ...).
//!
//! Connection setup is not part of the trait: a guest builds a connected
//! transport and hands it to [`GuestNode::start`](crate::guest::GuestNode::start);
//! a host receives one [`IncomingConnection`] per accepted guest.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use bingo_link::error::BingoError;
//! use bingo_link::transport::Transport;
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), BingoError> {
//!         todo!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, BingoError>> {
//!         // Return None when the connection is closed cleanly
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), BingoError> {
//!         todo!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::BingoError;
use crate::protocol::PlayerId;

/// A bidirectional text message transport.
///
/// Each call to [`send`](Transport::send) transmits one complete JSON message
/// and each call to [`recv`](Transport::recv) returns one.
///
/// # Object Safety
///
/// The trait is object-safe; hosts hold guest connections as
/// `Box<dyn Transport>`.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **MUST** be cancel-safe because it is polled
/// inside `tokio::select!`. Cancelling it must not lose a message.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one JSON text message to the peer.
    ///
    /// # Errors
    ///
    /// Returns [`BingoError::TransportSend`] if the message could not be sent,
    /// or [`BingoError::TransportClosed`] after [`close`](Transport::close).
    async fn send(&mut self, message: String) -> Result<(), BingoError>;

    /// Receive the next JSON text message from the peer.
    ///
    /// Returns:
    /// - `Some(Ok(text))`: a complete message was received
    /// - `Some(Err(e))`: a transport error occurred
    /// - `None`: the peer closed the connection cleanly
    async fn recv(&mut self) -> Option<Result<String, BingoError>>;

    /// Close the connection gracefully. Closing twice is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails. Resources are released
    /// either way.
    async fn close(&mut self) -> Result<(), BingoError>;
}

#[async_trait]
impl Transport for Box<dyn Transport> {
    async fn send(&mut self, message: String) -> Result<(), BingoError> {
        (**self).send(message).await
    }

    async fn recv(&mut self) -> Option<Result<String, BingoError>> {
        (**self).recv().await
    }

    async fn close(&mut self) -> Result<(), BingoError> {
        (**self).close().await
    }
}

/// A guest connection accepted by the host, tagged with the id the guest
/// announced when connecting.
pub struct IncomingConnection {
    pub peer_id: PlayerId,
    pub transport: Box<dyn Transport>,
}

impl IncomingConnection {
    pub fn new(peer_id: PlayerId, transport: impl Transport) -> Self {
        Self {
            peer_id,
            transport: Box::new(transport),
        }
    }
}

impl std::fmt::Debug for IncomingConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncomingConnection")
            .field("peer_id", &self.peer_id)
            .finish_non_exhaustive()
    }
}
