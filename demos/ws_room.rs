//! # WebSocket Room Example
//!
//! Host a room on this machine or join one on the local network, then play
//! from the terminal.
//!
//! ## Running
//!
//! ```sh
//! # Terminal 1: host on port 9000 and print the room code
//! cargo run --example ws_room -- host Hank
//!
//! # Terminal 2: join with the printed code
//! cargo run --example ws_room -- join Alice 42 ws://127.0.0.1:9000
//! ```
//!
//! Commands: `start` (host only), `call <n>`, `restart`, `quit`. A random
//! board is confirmed automatically when setup begins.

use bingo_link::transports::websocket::room_url;
use bingo_link::{
    BingoConfig, BingoError, Board, GuestNode, HostNode, PlayerId, RoomCode, SessionEvent,
    WebSocketListener, WebSocketTransport,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const DEFAULT_BIND: &str = "0.0.0.0:9000";

/// Either side of the room, driven by the same terminal loop.
enum Node {
    Host(HostNode),
    Guest(GuestNode),
}

impl Node {
    async fn trigger_setup(&self) -> Result<(), BingoError> {
        match self {
            Self::Host(host) => host.trigger_setup().await,
            Self::Guest(_) => Err(BingoError::NotHost),
        }
    }

    async fn confirm_board(&self, board: Board) -> Result<(), BingoError> {
        match self {
            Self::Host(host) => host.confirm_board(board).await,
            Self::Guest(guest) => guest.confirm_board(board).await,
        }
    }

    async fn click_number(&self, number: u32) -> Result<(), BingoError> {
        match self {
            Self::Host(host) => host.click_number(number).await,
            Self::Guest(guest) => guest.click_number(number).await,
        }
    }

    async fn request_restart(&self) -> Result<(), BingoError> {
        match self {
            Self::Host(host) => host.request_restart().await,
            Self::Guest(guest) => guest.request_restart().await,
        }
    }

    async fn shutdown(&mut self) {
        match self {
            Self::Host(host) => host.shutdown().await,
            Self::Guest(guest) => guest.shutdown().await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Arguments ───────────────────────────────────────────────────
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (mut node, mut events) = match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["host", name] => host(name).await?,
        ["join", name, code, base] => join(name, code, base).await?,
        _ => {
            eprintln!("usage: ws_room host <name> | ws_room join <name> <code> <ws://host:port>");
            return Ok(());
        }
    };

    // ── Event loop ──────────────────────────────────────────────────
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    SessionEvent::RosterUpdated { players } => {
                        let names: Vec<_> = players.iter().map(|p| p.name.as_str()).collect();
                        println!("players: {}", names.join(", "));
                    }
                    SessionEvent::SetupStarted { grid_size } => {
                        let board = Board::random(grid_size, &mut rand::rng());
                        println!("setup {grid_size}, board: {:?}", board.numbers());
                        if let Err(e) = node.confirm_board(board).await {
                            println!("could not confirm board: {e}");
                        }
                    }
                    SessionEvent::NumberCalled { number, next_turn } => {
                        println!("called {number}, turn {next_turn}");
                    }
                    SessionEvent::LinesUpdated { line_count, .. } => {
                        println!("lines: {line_count}");
                    }
                    SessionEvent::GameOver { winner } => println!("BINGO! {winner} wins"),
                    SessionEvent::Notice { message, .. } => println!("notice: {message}"),
                    SessionEvent::Disconnected { reason } => {
                        println!("disconnected: {}", reason.as_deref().unwrap_or("unknown"));
                        break;
                    }
                    other => tracing::debug!(?other, "event"),
                }
            }

            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                let result = match line.split_whitespace().collect::<Vec<_>>().as_slice() {
                    ["start"] => node.trigger_setup().await,
                    ["call", n] => match n.parse() {
                        Ok(n) => node.click_number(n).await,
                        Err(_) => {
                            println!("not a number: {n}");
                            Ok(())
                        }
                    },
                    ["restart"] => node.request_restart().await,
                    ["quit"] => break,
                    _ => {
                        println!("commands: start | call <n> | restart | quit");
                        Ok(())
                    }
                };
                if let Err(e) = result {
                    println!("error: {e}");
                }
            }
        }
    }

    node.shutdown().await;
    Ok(())
}

async fn host(name: &str) -> Result<(Node, mpsc::Receiver<SessionEvent>), BingoError> {
    let room = RoomCode::generate(&mut rand::rng());
    let listener = WebSocketListener::bind(DEFAULT_BIND, &room).await?;
    println!("room code {room}, guests connect to {}", listener.url()?);

    let (host, events) = HostNode::start(room, listener.into_incoming(), BingoConfig::new(name));
    Ok((Node::Host(host), events))
}

async fn join(
    name: &str,
    code: &str,
    base: &str,
) -> Result<(Node, mpsc::Receiver<SessionEvent>), BingoError> {
    let room = RoomCode::parse(code)?;
    let local_id = PlayerId::random();
    let transport = WebSocketTransport::connect(&room_url(base, &room), &local_id).await?;
    let (guest, events) = GuestNode::start(transport, local_id, BingoConfig::new(name));
    Ok((Node::Guest(guest), events))
}
