#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for bingo-link integration tests.
//!
//! Provides a scripted [`MockTransport`], an in-memory [`Room`] that pumps
//! messages between sans-IO sessions, and JSON fixture helpers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use bingo_link::protocol::{GridSize, GuestMessage, HostMessage, Player, PlayerId};
use bingo_link::{BingoError, GameSession, Outgoing, Transport};

// ── MockTransport ───────────────────────────────────────────────────

/// A mock transport for driving a guest runtime.
///
/// Scripted host messages are consumed in order by `recv()`. Everything the
/// guest sends is recorded in `sent`.
pub struct MockTransport {
    incoming: VecDeque<Option<Result<String, BingoError>>>,
    pub sent: Arc<StdMutex<Vec<String>>>,
    pub closed: Arc<AtomicBool>,
}

impl MockTransport {
    /// Returns the transport plus shared handles for inspecting sent messages
    /// and whether close was called.
    pub fn new(
        incoming: Vec<Option<Result<String, BingoError>>>,
    ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self {
            incoming: VecDeque::from(incoming),
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        (transport, sent, closed)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), BingoError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, BingoError>> {
        if let Some(item) = self.incoming.pop_front() {
            item
        } else {
            // Script exhausted: stay open until shutdown.
            std::future::pending().await
        }
    }

    async fn close(&mut self) -> Result<(), BingoError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

/// Poll `sent` until it holds at least `count` messages.
pub async fn wait_for_sent(sent: &Arc<StdMutex<Vec<String>>>, count: usize) -> Vec<String> {
    for _ in 0..200 {
        {
            let sent = sent.lock().unwrap();
            if sent.len() >= count {
                return sent.clone();
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {count} sent messages, got {:?}", sent.lock().unwrap());
}

// ── In-memory room ──────────────────────────────────────────────────

/// A host and guests wired together without any transport.
///
/// Every outgoing message is serialized and parsed again on delivery, so the
/// wire format is exercised too.
pub struct Room {
    pub host: GameSession,
    pub guests: Vec<GameSession>,
}

impl Room {
    pub const HOST_ID: &'static str = "bingo-pwa-42";

    /// Host "Hank" plus one guest per name, all joined and pumped.
    pub fn with_guests(grid: u32, window: Duration, names: &[&str]) -> Self {
        let host = GameSession::host(
            PlayerId::new(Self::HOST_ID),
            "Hank",
            GridSize::new(grid).unwrap(),
            window,
        );
        let mut room = Self {
            host,
            guests: Vec::new(),
        };
        for (i, name) in names.iter().enumerate() {
            let mut guest = GameSession::guest(PlayerId::new(format!("g{i}")), *name);
            guest.join();
            room.guests.push(guest);
        }
        room.pump();
        room
    }

    pub fn guest(&mut self, index: usize) -> &mut GameSession {
        &mut self.guests[index]
    }

    /// Deliver queued messages until every queue is empty.
    pub fn pump(&mut self) {
        loop {
            let mut delivered = false;

            for i in 0..self.guests.len() {
                let from = self.guests[i].local_id().clone();
                for out in self.guests[i].drain_outgoing() {
                    let Outgoing::ToHost(message) = out else {
                        panic!("guest queued a host message");
                    };
                    let wire = serde_json::to_string(&message).unwrap();
                    let parsed: GuestMessage = serde_json::from_str(&wire).unwrap();
                    self.host.handle_guest_message(&from, parsed);
                    delivered = true;
                }
            }

            for out in self.host.drain_outgoing() {
                let Outgoing::ToPeer { peer, message } = out else {
                    panic!("host queued a guest message");
                };
                let wire = serde_json::to_string(&message).unwrap();
                let parsed: HostMessage = serde_json::from_str(&wire).unwrap();
                if let Some(guest) = self.guests.iter_mut().find(|g| g.local_id() == &peer) {
                    guest.apply_host_message(parsed);
                }
                delivered = true;
            }

            if !delivered {
                break;
            }
        }
    }

    /// Drop guest `index` and tell the host its connection closed.
    pub fn disconnect(&mut self, index: usize) -> GameSession {
        let guest = self.guests.remove(index);
        self.host.handle_disconnect(guest.local_id());
        self.pump();
        guest
    }

    /// Every session, host first.
    pub fn sessions(&self) -> impl Iterator<Item = &GameSession> {
        std::iter::once(&self.host).chain(self.guests.iter())
    }
}

/// Row-major cells `1..=n²` as typed input.
pub fn row_major_cells(grid: u32) -> Vec<String> {
    (1..=grid * grid).map(|n| n.to_string()).collect()
}

/// Row-major cells in reverse, so rows complete in a different order.
pub fn reversed_cells(grid: u32) -> Vec<String> {
    (1..=grid * grid).rev().map(|n| n.to_string()).collect()
}

// ── JSON helpers ────────────────────────────────────────────────────

pub fn player(id: &str, name: &str, ready: bool) -> Player {
    Player {
        id: PlayerId::new(id),
        name: name.into(),
        is_ready: ready,
    }
}

pub fn host_json(message: &HostMessage) -> String {
    serde_json::to_string(message).expect("host message serialization")
}

pub fn start_setup_json(grid: u32) -> String {
    host_json(&HostMessage::StartSetup {
        grid_size: GridSize::new(grid).unwrap(),
    })
}

pub fn start_game_json(players: Vec<Player>) -> String {
    host_json(&HostMessage::StartGame { players })
}

pub fn number_called_json(number: u32, next_turn: usize) -> String {
    host_json(&HostMessage::NumberCalled { number, next_turn })
}

pub fn game_over_json(winner: &str) -> String {
    host_json(&HostMessage::GameOver {
        winner: winner.into(),
    })
}
