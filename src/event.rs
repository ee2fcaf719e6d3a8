//! Outward notifications for the rendering collaborator.
//!
//! A [`GameSession`](crate::session::GameSession) queues these as it applies
//! transitions; the async runtimes forward them on a bounded channel.

use std::collections::BTreeSet;

use crate::error_codes::ErrorCode;
use crate::protocol::{GridSize, Player, PlayerId};

/// Something the renderer should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session loop is running and, for guests, the host link is up.
    Connected,
    /// The roster changed (join, readiness, disconnect, restart).
    RosterUpdated { players: Vec<Player> },
    /// A player's connection closed and they were removed.
    PlayerLeft { player_id: PlayerId },
    /// Setup began with this grid; the player should enter a board. Emitted
    /// once per setup.
    SetupStarted { grid_size: GridSize },
    /// The local board was accepted; waiting for the others.
    ReadyConfirmed,
    /// Play began; `players` is the turn order.
    GameStarted { players: Vec<Player> },
    /// A number was called and the turn moved.
    NumberCalled { number: u32, next_turn: usize },
    /// Completed lines on the local board after a call.
    LinesUpdated {
        line_count: usize,
        completed_cells: BTreeSet<usize>,
    },
    /// The round ended.
    GameOver { winner: String },
    /// Restart was applied locally; a new setup follows.
    Restarted,
    /// One-shot user-visible notice (protocol rejection, transport trouble).
    Notice {
        message: String,
        error_code: Option<ErrorCode>,
    },
    /// The session loop ended. For a guest this is fatal to the room.
    Disconnected { reason: Option<String> },
}

#[cfg(feature = "tokio-runtime")]
pub(crate) mod emit {
    use tokio::sync::mpsc;
    use tracing::{debug, warn};

    use super::SessionEvent;

    /// Emit an event to the event channel. If the channel is full, log a
    /// warning and drop the event to avoid blocking the session loop.
    pub(crate) fn emit_event(event_tx: &mpsc::Sender<SessionEvent>, event: SessionEvent) {
        match event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!("event channel full, dropping event: {dropped:?}");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("event channel closed, receiver dropped");
            }
        }
    }

    /// Emit [`SessionEvent::Disconnected`].
    ///
    /// Uses `send().await` because `Disconnected` is always the last event on
    /// the channel and must never be silently dropped.
    pub(crate) async fn emit_disconnected(
        event_tx: &mpsc::Sender<SessionEvent>,
        reason: Option<String>,
    ) {
        if event_tx
            .send(SessionEvent::Disconnected { reason })
            .await
            .is_err()
        {
            debug!("event channel closed, receiver dropped");
        }
    }
}
