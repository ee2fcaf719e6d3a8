//! Async guest runtime.
//!
//! [`GuestNode::start`] takes a connected [`Transport`] to the host, sends
//! `JOIN`, and runs a loop that applies host broadcasts to a guest
//! [`GameSession`] and forwards local input as intent messages. Losing the
//! host connection ends the loop with
//! [`SessionEvent::Disconnected`]; there is no reconnection.
//!
//! # Example
//!
//! ```rust,ignore
//! let room = RoomCode::parse(&typed_code)?;
//! let local_id = PlayerId::random();
//! let transport = WebSocketTransport::connect(&room_url(host_addr, &room), &local_id).await?;
//! let (guest, mut events) = GuestNode::start(transport, local_id, BingoConfig::new("Gina"));
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         SessionEvent::SetupStarted { grid_size } => {
//!             guest.confirm_board(Board::random(grid_size, &mut rand::rng())).await?;
//!         }
//!         SessionEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::board::Board;
use crate::config::BingoConfig;
use crate::error::Result;
use crate::error_codes::ErrorCode;
use crate::event::emit::{emit_disconnected, emit_event};
use crate::event::SessionEvent;
use crate::node::{forward_events, Command, NodeHandle};
use crate::protocol::{HostMessage, PlayerId};
use crate::session::{GameSession, Outgoing};
use crate::state::GameState;
use crate::transport::Transport;

/// Handle to a running guest.
///
/// Dropping the handle aborts the session loop; call
/// [`shutdown`](Self::shutdown) to close the host connection gracefully.
pub struct GuestNode {
    handle: NodeHandle,
    local_id: PlayerId,
}

impl GuestNode {
    /// Start the guest loop over an already connected transport.
    ///
    /// `local_id` must be the id the transport announced to the host.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        transport: impl Transport,
        local_id: PlayerId,
        config: BingoConfig,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let session = GameSession::guest(local_id.clone(), config.player_name);

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(guest_loop(session, transport, cmd_rx, event_tx, shutdown_rx));

        let node = Self {
            handle: NodeHandle::new(cmd_tx, task, shutdown_tx, config.shutdown_timeout),
            local_id,
        };
        (node, event_rx)
    }

    pub fn local_id(&self) -> &PlayerId {
        &self.local_id
    }

    /// Validate raw cell input, keep it as this round's board and tell the
    /// host we are ready.
    ///
    /// # Errors
    ///
    /// Validation and phase errors from [`GameSession::confirm_readiness`],
    /// or [`BingoError::NotConnected`](crate::BingoError::NotConnected) if the loop has stopped.
    pub async fn confirm_readiness(&self, cells: Vec<String>) -> Result<()> {
        self.handle
            .request(|reply| Command::ConfirmReadiness(cells, reply))
            .await
    }

    /// # Errors
    ///
    /// Phase and grid errors from [`GameSession::confirm_board`].
    pub async fn confirm_board(&self, board: Board) -> Result<()> {
        self.handle
            .request(|reply| Command::ConfirmBoard(board, reply))
            .await
    }

    /// Ask the host to call `number`. Only allowed on our turn.
    ///
    /// # Errors
    ///
    /// Errors from [`GameSession::click_cell`].
    pub async fn click_number(&self, number: u32) -> Result<()> {
        self.handle
            .request(|reply| Command::ClickNumber(number, reply))
            .await
    }

    /// Ask the host to restart the round.
    ///
    /// # Errors
    ///
    /// [`BingoError::NotConnected`](crate::BingoError::NotConnected) if the loop has stopped.
    pub async fn request_restart(&self) -> Result<()> {
        self.handle.request(Command::RequestRestart).await
    }

    /// Snapshot of the mirrored state.
    ///
    /// # Errors
    ///
    /// [`BingoError::NotConnected`](crate::BingoError::NotConnected) if the loop has stopped.
    pub async fn state(&self) -> Result<GameState> {
        self.handle.request(Command::Snapshot).await
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    pub async fn shutdown(&mut self) {
        debug!(id = %self.local_id, "GuestNode: shutdown requested");
        self.handle.shutdown().await;
    }
}

impl std::fmt::Debug for GuestNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestNode")
            .field("local_id", &self.local_id)
            .field("running", &self.is_running())
            .field("has_task", &self.handle.has_task())
            .finish()
    }
}

async fn guest_loop(
    mut session: GameSession,
    mut transport: impl Transport,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: mpsc::Sender<SessionEvent>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    info!(id = %session.local_id(), "guest loop started");
    emit_event(&event_tx, SessionEvent::Connected);
    session.join();

    let mut reason = flush(&mut session, &mut transport, &event_tx).await.err();

    while reason.is_none() {
        tokio::select! {
            _ = &mut shutdown_rx => {
                let _ = transport.close().await;
                reason = Some("guest shut down".to_string());
                break;
            }

            cmd = cmd_rx.recv() => match cmd {
                Some(cmd) => cmd.apply(&mut session),
                None => {
                    let _ = transport.close().await;
                    reason = Some("guest handle dropped".to_string());
                    break;
                }
            },

            incoming = transport.recv() => match incoming {
                Some(Ok(text)) => match serde_json::from_str::<HostMessage>(&text) {
                    Ok(message) => {
                        debug!(kind = message.kind(), "host message");
                        session.apply_host_message(message);
                    }
                    Err(e) => warn!("failed to deserialize host message: {e}; raw: {text}"),
                },
                Some(Err(e)) => {
                    error!("transport receive error: {e}");
                    lost_host(&event_tx);
                    reason = Some(format!("transport receive error: {e}"));
                    break;
                }
                None => {
                    info!("host closed the connection");
                    lost_host(&event_tx);
                    reason = Some("host closed the connection".to_string());
                    break;
                }
            },
        }

        if let Err(e) = flush(&mut session, &mut transport, &event_tx).await {
            reason = Some(e);
        }
    }

    // Events queued before the loop ended still reach the renderer.
    forward_events(&mut session, &event_tx);
    emit_disconnected(&event_tx, reason).await;
    debug!("guest loop exited");
}

/// Tell the renderer the room is gone before the final `Disconnected`.
fn lost_host(event_tx: &mpsc::Sender<SessionEvent>) {
    emit_event(
        event_tx,
        SessionEvent::Notice {
            message: ErrorCode::ConnectionError.description().to_string(),
            error_code: Some(ErrorCode::ConnectionError),
        },
    );
}

/// Send queued intent messages to the host and forward queued events.
///
/// Returns the disconnect reason if the transport rejects a send.
async fn flush(
    session: &mut GameSession,
    transport: &mut impl Transport,
    event_tx: &mpsc::Sender<SessionEvent>,
) -> std::result::Result<(), String> {
    forward_events(session, event_tx);
    for outgoing in session.drain_outgoing() {
        match outgoing {
            Outgoing::ToHost(message) => match serde_json::to_string(&message) {
                Ok(json) => {
                    if let Err(e) = transport.send(json).await {
                        error!("transport send error: {e}");
                        lost_host(event_tx);
                        return Err(format!("transport send error: {e}"));
                    }
                }
                Err(e) => error!("failed to serialize GuestMessage: {e}"),
            },
            Outgoing::ToPeer { peer, message } => {
                warn!(%peer, kind = message.kind(), "guest session queued a host message; dropped");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::BingoError;
    use crate::protocol::{GridSize, Player};
    use crate::state::Phase;
    use crate::transports::ChannelTransport;

    async fn next_text(transport: &mut ChannelTransport) -> String {
        tokio::time::timeout(Duration::from_secs(2), transport.recv())
            .await
            .expect("timed out waiting for guest message")
            .unwrap()
            .unwrap()
    }

    async fn send(transport: &mut ChannelTransport, message: &HostMessage) {
        transport
            .send(serde_json::to_string(message).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn start_sends_join() {
        let (guest_side, mut host) = ChannelTransport::pair();
        let (mut guest, _events) =
            GuestNode::start(guest_side, PlayerId::new("g1"), BingoConfig::new("Gina"));

        assert_eq!(next_text(&mut host).await, r#"{"type":"JOIN","name":"Gina"}"#);
        guest.shutdown().await;
    }

    #[tokio::test]
    async fn setup_and_ready_round_trip() {
        let (guest_side, mut host) = ChannelTransport::pair();
        let (mut guest, _events) =
            GuestNode::start(guest_side, PlayerId::new("g1"), BingoConfig::new("Gina"));
        next_text(&mut host).await;

        send(
            &mut host,
            &HostMessage::StartSetup {
                grid_size: GridSize::new(5).unwrap(),
            },
        )
        .await;
        // Let START_SETUP land before confirming.
        tokio::time::sleep(Duration::from_millis(20)).await;
        guest
            .confirm_board(Board::random(GridSize::new(5).unwrap(), &mut rand::rng()))
            .await
            .unwrap();
        assert_eq!(next_text(&mut host).await, r#"{"type":"READY"}"#);
        guest.shutdown().await;
    }

    #[tokio::test]
    async fn host_loss_is_fatal() {
        let (guest_side, mut host) = ChannelTransport::pair();
        let (guest, mut events) =
            GuestNode::start(guest_side, PlayerId::new("g1"), BingoConfig::new("Gina"));
        next_text(&mut host).await;
        drop(host);

        let mut saw_notice = false;
        loop {
            match events.recv().await.unwrap() {
                SessionEvent::Notice { error_code, .. } => {
                    saw_notice = error_code == Some(ErrorCode::ConnectionError);
                }
                SessionEvent::Disconnected { reason } => {
                    assert_eq!(reason.as_deref(), Some("host closed the connection"));
                    break;
                }
                _ => {}
            }
        }
        assert!(saw_notice);
        assert!(matches!(guest.state().await, Err(BingoError::NotConnected)));
    }

    #[tokio::test]
    async fn number_called_updates_mirror() {
        let (guest_side, mut host) = ChannelTransport::pair();
        let (mut guest, _events) =
            GuestNode::start(guest_side, PlayerId::new("g1"), BingoConfig::new("Gina"));
        next_text(&mut host).await;

        let players = vec![
            Player::new(PlayerId::new("bingo-pwa-42"), "Hank"),
            Player::new(PlayerId::new("g1"), "Gina"),
        ];
        send(&mut host, &HostMessage::StartGame { players }).await;
        send(
            &mut host,
            &HostMessage::NumberCalled {
                number: 9,
                next_turn: 1,
            },
        )
        .await;
        host.send("garbage".into()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let state = guest.state().await.unwrap();
        assert_eq!(state.phase(), Phase::Playing);
        assert_eq!(state.called(), &[9]);
        assert_eq!(state.turn_index(), 1);
        guest.shutdown().await;
    }
}
