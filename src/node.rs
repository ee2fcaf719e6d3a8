//! Handle plumbing shared by [`HostNode`](crate::host::HostNode) and
//! [`GuestNode`](crate::guest::GuestNode).
//!
//! Each node owns its [`GameSession`] inside one spawned task. The handle
//! talks to it over an unbounded command channel; every command carries a
//! oneshot for the result, so callers see validation and phase errors.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::board::Board;
use crate::error::{BingoError, Result};
use crate::event::emit::emit_event;
use crate::event::SessionEvent;
use crate::session::GameSession;
use crate::state::GameState;

pub(crate) type Reply<T> = oneshot::Sender<Result<T>>;

/// Local input forwarded to the session task.
pub(crate) enum Command {
    TriggerSetup(Reply<()>),
    ConfirmReadiness(Vec<String>, Reply<()>),
    ConfirmBoard(Board, Reply<()>),
    ClickNumber(u32, Reply<()>),
    RequestRestart(Reply<()>),
    Snapshot(Reply<GameState>),
}

impl Command {
    /// Run the command against `session` and answer the caller.
    pub(crate) fn apply(self, session: &mut GameSession) {
        // A dropped reply receiver only means the caller stopped waiting.
        match self {
            Self::TriggerSetup(reply) => {
                let _ = reply.send(session.trigger_setup());
            }
            Self::ConfirmReadiness(cells, reply) => {
                let _ = reply.send(session.confirm_readiness(&cells));
            }
            Self::ConfirmBoard(board, reply) => {
                let _ = reply.send(session.confirm_board(board));
            }
            Self::ClickNumber(number, reply) => {
                let _ = reply.send(session.click_cell(number));
            }
            Self::RequestRestart(reply) => {
                session.request_restart();
                let _ = reply.send(Ok(()));
            }
            Self::Snapshot(reply) => {
                let _ = reply.send(Ok(session.state().clone()));
            }
        }
    }
}

/// Forward every queued session event to the event channel.
pub(crate) fn forward_events(session: &mut GameSession, event_tx: &mpsc::Sender<SessionEvent>) {
    for event in session.drain_events() {
        emit_event(event_tx, event);
    }
}

/// Sleep until the arbiter deadline, or forever if no window is open.
pub(crate) async fn sleep_until_deadline(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}

/// Command sender, task handle and shutdown signal of a running node.
pub(crate) struct NodeHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl NodeHandle {
    pub(crate) fn new(
        cmd_tx: mpsc::UnboundedSender<Command>,
        task: JoinHandle<()>,
        shutdown_tx: oneshot::Sender<()>,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            cmd_tx,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout,
        }
    }

    /// Send a command built around a fresh reply channel and await the answer.
    pub(crate) async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(build(reply_tx))
            .map_err(|_| BingoError::NotConnected)?;
        reply_rx.await.map_err(|_| BingoError::NotConnected)?
    }

    pub(crate) fn is_running(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    pub(crate) fn has_task(&self) -> bool {
        self.task.is_some()
    }

    /// Signal the session loop to stop and wait for it, aborting it if it
    /// does not finish within the shutdown timeout.
    pub(crate) async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => warn!("session loop terminated with join error: {join_err}"),
                Err(_) => {
                    warn!("session loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("session loop aborted: {join_err}");
                    }
                }
            }
        }
    }
}

impl Drop for NodeHandle {
    fn drop(&mut self) {
        // No executor to drive a graceful close from here, so just abort.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
