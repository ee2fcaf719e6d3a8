//! In-process loopback transport.
//!
//! [`ChannelTransport::pair`] returns two connected ends backed by unbounded
//! channels. Closing (or dropping) one end makes the other end's
//! [`recv`](Transport::recv) return `None`, the same way a closed socket does.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::BingoError;
use crate::transport::Transport;

/// One end of an in-process connection.
#[derive(Debug)]
pub struct ChannelTransport {
    tx: Option<mpsc::UnboundedSender<String>>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl ChannelTransport {
    /// Create two connected ends.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Some(a_tx),
                rx: a_rx,
            },
            Self {
                tx: Some(b_tx),
                rx: b_rx,
            },
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&mut self, message: String) -> Result<(), BingoError> {
        let Some(tx) = &self.tx else {
            return Err(BingoError::TransportClosed);
        };
        tx.send(message)
            .map_err(|e| BingoError::TransportSend(e.to_string()))
    }

    /// Cancel-safe because `UnboundedReceiver::recv` is.
    async fn recv(&mut self) -> Option<Result<String, BingoError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), BingoError> {
        self.tx = None;
        self.rx.close();
        Ok(())
    }
}
