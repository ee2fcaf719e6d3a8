//! Async host runtime.
//!
//! [`HostNode::start`] spawns the session loop and returns a handle plus the
//! event receiver. The loop owns the host [`GameSession`] and handles one
//! input at a time: a local command, a new guest connection, one inbound
//! guest message, a closed connection, or the win window expiring. After
//! each input it writes queued messages to the guests and forwards events.
//!
//! Every guest connection gets its own link task that writes outbound JSON
//! and reads inbound JSON, so a slow guest never stalls the loop.
//!
//! # Example
//!
//! ```rust,ignore
//! let room = RoomCode::generate(&mut rand::rng());
//! let listener = WebSocketListener::bind("0.0.0.0:9000", &room).await?;
//! let (host, mut events) = HostNode::start(room, listener.into_incoming(), BingoConfig::new("Hank"));
//!
//! host.trigger_setup().await?;
//! while let Some(event) = events.recv().await {
//!     match event {
//!         SessionEvent::GameOver { winner } => println!("{winner} won"),
//!         SessionEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::board::Board;
use crate::config::BingoConfig;
use crate::error::Result;
use crate::error_codes::ErrorCode;
use crate::event::emit::{emit_disconnected, emit_event};
use crate::event::SessionEvent;
use crate::node::{forward_events, sleep_until_deadline, Command, NodeHandle};
use crate::protocol::{GuestMessage, HostMessage, PlayerId};
use crate::room::RoomCode;
use crate::session::{GameSession, Outgoing};
use crate::state::GameState;
use crate::transport::{IncomingConnection, Transport};

// ── Handle ──────────────────────────────────────────────────────────

/// Handle to a running host.
///
/// Dropping the handle aborts the session loop; call
/// [`shutdown`](Self::shutdown) to close guest connections gracefully.
pub struct HostNode {
    handle: NodeHandle,
    room: RoomCode,
    local_id: PlayerId,
}

impl HostNode {
    /// Start hosting `room`. Guests arrive on `incoming`.
    ///
    /// The host joins its own roster under the room's endpoint name.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        room: RoomCode,
        incoming: mpsc::Receiver<IncomingConnection>,
        config: BingoConfig,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let local_id = room.host_id();
        let session = GameSession::host(
            local_id.clone(),
            config.player_name,
            config.grid_size,
            config.win_window,
        );

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(host_loop(session, incoming, cmd_rx, event_tx, shutdown_rx));

        let node = Self {
            handle: NodeHandle::new(cmd_tx, task, shutdown_tx, config.shutdown_timeout),
            room,
            local_id,
        };
        (node, event_rx)
    }

    pub fn room(&self) -> &RoomCode {
        &self.room
    }

    pub fn local_id(&self) -> &PlayerId {
        &self.local_id
    }

    /// Move the room from the lobby into setup.
    ///
    /// # Errors
    ///
    /// [`BingoError::InvalidPhase`](crate::BingoError::InvalidPhase) once a
    /// round is running, or [`BingoError::NotConnected`](crate::BingoError::NotConnected)
    /// if the loop has stopped.
    pub async fn trigger_setup(&self) -> Result<()> {
        self.handle.request(Command::TriggerSetup).await
    }

    /// Validate and confirm the host's board from raw cell input.
    ///
    /// # Errors
    ///
    /// Validation and phase errors from
    /// [`GameSession::confirm_readiness`].
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

    /// Call a number from the host's board.
    ///
    /// # Errors
    ///
    /// Errors from [`GameSession::click_cell`].
    pub async fn click_number(&self, number: u32) -> Result<()> {
        self.handle
            .request(|reply| Command::ClickNumber(number, reply))
            .await
    }

    /// Restart the round for everyone.
    ///
    /// # Errors
    ///
    /// [`BingoError::NotConnected`](crate::BingoError::NotConnected) if the
    /// loop has stopped.
    pub async fn request_restart(&self) -> Result<()> {
        self.handle.request(Command::RequestRestart).await
    }

    /// Snapshot of the authoritative state.
    ///
    /// # Errors
    ///
    /// [`BingoError::NotConnected`](crate::BingoError::NotConnected) if the
    /// loop has stopped.
    pub async fn state(&self) -> Result<GameState> {
        self.handle.request(Command::Snapshot).await
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    /// Close every guest connection and stop the loop.
    pub async fn shutdown(&mut self) {
        debug!(room = %self.room, "HostNode: shutdown requested");
        self.handle.shutdown().await;
    }
}

impl std::fmt::Debug for HostNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostNode")
            .field("room", &self.room)
            .field("running", &self.is_running())
            .field("has_task", &self.handle.has_task())
            .finish()
    }
}

// ── Guest links ─────────────────────────────────────────────────────

/// Something a link task observed on its connection.
#[derive(Debug)]
enum LinkEvent {
    Message { peer: PlayerId, text: String },
    Closed { peer: PlayerId },
}

struct PeerLink {
    out_tx: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

fn spawn_link(
    peer: PlayerId,
    transport: Box<dyn Transport>,
    link_tx: mpsc::UnboundedSender<LinkEvent>,
) -> PeerLink {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(link_loop(peer, transport, out_rx, link_tx));
    PeerLink { out_tx, task }
}

/// Pump one guest connection.
///
/// Ends with [`LinkEvent::Closed`] when the guest goes away. When the host
/// drops the link, queued messages are flushed and the transport closed
/// without reporting back.
async fn link_loop(
    peer: PlayerId,
    mut transport: Box<dyn Transport>,
    mut out_rx: mpsc::UnboundedReceiver<String>,
    link_tx: mpsc::UnboundedSender<LinkEvent>,
) {
    loop {
        tokio::select! {
            out = out_rx.recv() => match out {
                Some(json) => {
                    if let Err(e) = transport.send(json).await {
                        warn!(%peer, "send to guest failed: {e}");
                        break;
                    }
                }
                None => {
                    let _ = transport.close().await;
                    return;
                }
            },
            incoming = transport.recv() => match incoming {
                Some(Ok(text)) => {
                    if link_tx.send(LinkEvent::Message { peer: peer.clone(), text }).is_err() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!(%peer, "receive from guest failed: {e}");
                    break;
                }
                None => {
                    debug!(%peer, "guest closed the connection");
                    break;
                }
            },
        }
    }
    let _ = transport.close().await;
    let _ = link_tx.send(LinkEvent::Closed { peer });
}

/// Refuse a connection whose id is already taken: one `ERROR`, then close.
fn refuse(peer: PlayerId, mut transport: Box<dyn Transport>) {
    tokio::spawn(async move {
        match serde_json::to_string(&HostMessage::error(ErrorCode::UnavailableId)) {
            Ok(json) => {
                if let Err(e) = transport.send(json).await {
                    debug!(%peer, "could not deliver refusal: {e}");
                }
            }
            Err(e) => error!("failed to serialize refusal: {e}"),
        }
        let _ = transport.close().await;
    });
}

// ── Session loop ────────────────────────────────────────────────────

async fn host_loop(
    mut session: GameSession,
    mut incoming: mpsc::Receiver<IncomingConnection>,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: mpsc::Sender<SessionEvent>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    info!(id = %session.local_id(), "host loop started");
    emit_event(&event_tx, SessionEvent::Connected);

    let (link_tx, mut link_rx) = mpsc::unbounded_channel::<LinkEvent>();
    let mut links: HashMap<PlayerId, PeerLink> = HashMap::new();
    let mut accepting = true;
    flush(&mut session, &links, &event_tx);

    let reason = loop {
        let deadline = session.next_deadline();
        tokio::select! {
            _ = &mut shutdown_rx => break "host shut down",

            cmd = cmd_rx.recv() => match cmd {
                Some(cmd) => cmd.apply(&mut session),
                None => break "host handle dropped",
            },

            conn = incoming.recv(), if accepting => match conn {
                Some(IncomingConnection { peer_id, transport }) => {
                    if links.contains_key(&peer_id) || &peer_id == session.local_id() {
                        warn!(%peer_id, "connection with duplicate id refused");
                        refuse(peer_id, transport);
                    } else {
                        debug!(%peer_id, "guest connected");
                        let link = spawn_link(peer_id.clone(), transport, link_tx.clone());
                        links.insert(peer_id, link);
                    }
                }
                None => {
                    debug!("incoming connection stream ended");
                    accepting = false;
                }
            },

            Some(event) = link_rx.recv() => match event {
                LinkEvent::Message { peer, text } => {
                    match serde_json::from_str::<GuestMessage>(&text) {
                        Ok(message) => session.handle_guest_message(&peer, message),
                        Err(e) => warn!(%peer, "failed to deserialize guest message: {e}; raw: {text}"),
                    }
                }
                LinkEvent::Closed { peer } => {
                    links.remove(&peer);
                    session.handle_disconnect(&peer);
                }
            },

            () = sleep_until_deadline(deadline) => {
                if let Some(at) = deadline {
                    session.poll_timers(at);
                }
            }
        }

        flush(&mut session, &links, &event_tx);
    };

    debug!(reason, "host loop stopping");
    for (_, link) in links.drain() {
        drop(link.out_tx);
        if let Err(join_err) = link.task.await {
            debug!("guest link ended abnormally: {join_err}");
        }
    }
    emit_disconnected(&event_tx, Some(reason.to_string())).await;
    debug!("host loop exited");
}

/// Write queued messages to their links and forward queued events.
fn flush(
    session: &mut GameSession,
    links: &HashMap<PlayerId, PeerLink>,
    event_tx: &mpsc::Sender<SessionEvent>,
) {
    for outgoing in session.drain_outgoing() {
        match outgoing {
            Outgoing::ToPeer { peer, message } => {
                let Some(link) = links.get(&peer) else {
                    debug!(%peer, kind = message.kind(), "no link for peer, message dropped");
                    continue;
                };
                match serde_json::to_string(&message) {
                    Ok(json) => {
                        if link.out_tx.send(json).is_err() {
                            debug!(%peer, "guest link already closed");
                        }
                    }
                    Err(e) => error!("failed to serialize HostMessage: {e}"),
                }
            }
            Outgoing::ToHost(message) => {
                warn!(kind = message.kind(), "host session queued a guest message; dropped");
            }
        }
    }
    forward_events(session, event_tx);
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
    use crate::protocol::GridSize;
    use crate::state::Phase;
    use crate::transports::ChannelTransport;

    fn room() -> RoomCode {
        RoomCode::parse("42").unwrap()
    }

    async fn next_json(transport: &mut ChannelTransport) -> serde_json::Value {
        let text = tokio::time::timeout(Duration::from_secs(2), transport.recv())
            .await
            .expect("timed out waiting for host message")
            .unwrap()
            .unwrap();
        serde_json::from_str(&text).unwrap()
    }

    #[tokio::test]
    async fn start_emits_connected_and_roster() {
        let (_conn_tx, conn_rx) = mpsc::channel(4);
        let (mut host, mut events) = HostNode::start(room(), conn_rx, BingoConfig::new("Hank"));

        assert_eq!(events.recv().await.unwrap(), SessionEvent::Connected);
        match events.recv().await.unwrap() {
            SessionEvent::RosterUpdated { players } => {
                assert_eq!(players.len(), 1);
                assert_eq!(players[0].id.as_str(), "bingo-pwa-42");
            }
            other => panic!("expected RosterUpdated, got {other:?}"),
        }
        host.shutdown().await;
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::Disconnected { .. }
        ));
    }

    #[tokio::test]
    async fn join_is_answered_with_roster() {
        let (conn_tx, conn_rx) = mpsc::channel(4);
        let (mut host, _events) = HostNode::start(room(), conn_rx, BingoConfig::new("Hank"));

        let (mut guest, host_side) = ChannelTransport::pair();
        conn_tx
            .send(IncomingConnection::new(PlayerId::new("g1"), host_side))
            .await
            .unwrap();
        guest
            .send(r#"{"type":"JOIN","name":"Gina"}"#.into())
            .await
            .unwrap();

        let sync = next_json(&mut guest).await;
        assert_eq!(sync["type"], "SYNC_PLAYERS");
        assert_eq!(sync["players"][1]["name"], "Gina");
        assert_eq!(sync["players"][1]["isReady"], false);

        host.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_json_does_not_stop_the_loop() {
        let (conn_tx, conn_rx) = mpsc::channel(4);
        let (mut host, _events) = HostNode::start(room(), conn_rx, BingoConfig::new("Hank"));

        let (mut guest, host_side) = ChannelTransport::pair();
        conn_tx
            .send(IncomingConnection::new(PlayerId::new("g1"), host_side))
            .await
            .unwrap();
        guest.send("{not json".into()).await.unwrap();
        guest
            .send(r#"{"type":"JOIN","name":"Gina"}"#.into())
            .await
            .unwrap();

        assert_eq!(next_json(&mut guest).await["type"], "SYNC_PLAYERS");
        assert!(host.is_running());
        host.shutdown().await;
    }

    #[tokio::test]
    async fn duplicate_connection_id_is_refused() {
        let (conn_tx, conn_rx) = mpsc::channel(4);
        let (mut host, _events) = HostNode::start(room(), conn_rx, BingoConfig::new("Hank"));

        let (_first, first_host_side) = ChannelTransport::pair();
        conn_tx
            .send(IncomingConnection::new(PlayerId::new("g1"), first_host_side))
            .await
            .unwrap();
        let (mut second, second_host_side) = ChannelTransport::pair();
        conn_tx
            .send(IncomingConnection::new(PlayerId::new("g1"), second_host_side))
            .await
            .unwrap();

        let refusal = next_json(&mut second).await;
        assert_eq!(refusal["type"], "ERROR");
        assert_eq!(refusal["errorCode"], "UNAVAILABLE_ID");
        assert!(second.recv().await.is_none());
        host.shutdown().await;
    }

    #[tokio::test]
    async fn host_plays_solo_round() {
        let (_conn_tx, conn_rx) = mpsc::channel(4);
        let config = BingoConfig::new("Hank")
            .with_grid_size(GridSize::new(5).unwrap())
            .with_win_window(Duration::from_millis(20));
        let (mut host, _events) = HostNode::start(room(), conn_rx, config);

        host.trigger_setup().await.unwrap();
        let cells: Vec<String> = (1..=25).map(|n: u32| n.to_string()).collect();
        host.confirm_readiness(cells).await.unwrap();
        assert_eq!(host.state().await.unwrap().phase(), Phase::Playing);

        for number in 1..=25 {
            let _ = host.click_number(number).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        let state = host.state().await.unwrap();
        assert_eq!(state.phase(), Phase::GameOver);
        assert_eq!(state.winner(), Some("Hank"));
        host.shutdown().await;
    }

    #[tokio::test]
    async fn commands_fail_after_shutdown() {
        let (_conn_tx, conn_rx) = mpsc::channel(4);
        let (mut host, _events) = HostNode::start(room(), conn_rx, BingoConfig::new("Hank"));
        host.shutdown().await;
        assert!(matches!(
            host.trigger_setup().await,
            Err(crate::BingoError::NotConnected)
        ));
    }
}
