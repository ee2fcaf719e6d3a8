//! # Local Room Example
//!
//! Runs a whole room inside one process:
//!
//! 1. Start a host and connect two guests over in-process channel transports
//! 2. Move the room into setup and give everyone a random board
//! 3. Let whoever holds the turn call the lowest number nobody has called
//! 4. Print the winner once the host closes the win window
//!
//! ## Running
//!
//! ```sh
//! cargo run --example local_room
//!
//! # See every message the host routes:
//! RUST_LOG=bingo_link=debug cargo run --example local_room
//! ```

use std::time::Duration;

use bingo_link::transports::ChannelTransport;
use bingo_link::{
    BingoConfig, Board, GameState, GridSize, GuestNode, HostNode, IncomingConnection, Phase,
    PlayerId, RoomCode, SessionEvent,
};
use tokio::sync::mpsc;

const GUESTS: &[&str] = &["Alice", "Bob"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Host ────────────────────────────────────────────────────────
    let room = RoomCode::generate(&mut rand::rng());
    let grid = GridSize::new(5)?;
    let config = BingoConfig::new("Hank")
        .with_grid_size(grid)
        .with_win_window(Duration::from_millis(300));
    let (conn_tx, conn_rx) = mpsc::channel(8);
    let (mut host, mut host_events) = HostNode::start(room.clone(), conn_rx, config);
    tracing::info!("hosting room {room}");

    // ── Guests ──────────────────────────────────────────────────────
    let mut guests = Vec::new();
    for name in GUESTS {
        let id = PlayerId::random();
        let (guest_side, host_side) = ChannelTransport::pair();
        conn_tx
            .send(IncomingConnection::new(id.clone(), host_side))
            .await?;
        let (guest, events) = GuestNode::start(guest_side, id, BingoConfig::new(*name));
        guests.push(guest);
        // Guest events are not needed here; keep the receivers draining.
        tokio::spawn(drain(events));
    }

    while host.state().await?.players().len() < GUESTS.len() + 1 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // ── Setup ───────────────────────────────────────────────────────
    host.trigger_setup().await?;
    for guest in &guests {
        while guest.state().await?.phase() != Phase::Setup {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        guest
            .confirm_board(Board::random(grid, &mut rand::rng()))
            .await?;
    }
    host.confirm_board(Board::random(grid, &mut rand::rng()))
        .await?;

    // ── Play ────────────────────────────────────────────────────────
    loop {
        let state = host.state().await?;
        match state.phase() {
            Phase::GameOver => break,
            Phase::Playing => {}
            _ => {
                tokio::time::sleep(Duration::from_millis(10)).await;
                continue;
            }
        }

        let Some(number) = next_number(&state, grid) else {
            // Everything called; the win window is about to close.
            tokio::time::sleep(Duration::from_millis(50)).await;
            continue;
        };
        let Some(holder) = state.current_turn().map(|p| p.id.clone()) else {
            break;
        };
        if &holder == host.local_id() {
            host.click_number(number).await?;
        } else if let Some(guest) = guests.iter().find(|g| g.local_id() == &holder) {
            guest.click_number(number).await?;
        }

        let expected = state.called().len() + 1;
        while host.state().await?.called().len() < expected
            && host.state().await?.phase() == Phase::Playing
        {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    // ── Result ──────────────────────────────────────────────────────
    while let Ok(event) = host_events.try_recv() {
        if let SessionEvent::GameOver { winner } = event {
            tracing::info!("BINGO! {winner} wins");
        }
    }
    let state = host.state().await?;
    println!(
        "winner: {} after {} calls",
        state.winner().unwrap_or("nobody"),
        state.called().len()
    );

    for guest in &mut guests {
        guest.shutdown().await;
    }
    host.shutdown().await;
    Ok(())
}

/// Lowest number not yet called.
fn next_number(state: &GameState, grid: GridSize) -> Option<u32> {
    (1..=grid.max_number()).find(|n| !state.is_called(*n))
}

async fn drain(mut events: mpsc::Receiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        if let SessionEvent::GameOver { winner } = event {
            tracing::debug!("guest saw winner {winner}");
        }
    }
}
