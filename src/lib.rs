//! # Bingo Link
//!
//! Host-authoritative state synchronization for networked number-elimination
//! bingo.
//!
//! One participant hosts a room. Guests send intents (`JOIN`, `READY`,
//! `CLICK_NUMBER`, `BINGO`); the host validates them against its
//! authoritative [`GameState`](state::GameState) and broadcasts the outcome,
//! applying every broadcast to itself through the same handlers the guests
//! use. Each participant detects completed lines on its own private board and
//! claims a win; the host merges near-simultaneous claims into a joint
//! result.
//!
//! ## Layers
//!
//! - **Sans-IO core**: [`GameSession`] plus the pure pieces it drives
//!   ([`board`], [`detector`], [`arbiter`], [`state`], [`router`]). No
//!   sockets, no clocks it does not get handed.
//! - **Transports**: implement [`Transport`] for any text channel, or use
//!   [`ChannelTransport`](transports::ChannelTransport) and the WebSocket
//!   transport behind the default `transport-websocket` feature.
//! - **Runtimes**: [`HostNode`] and [`GuestNode`] run a session on tokio and
//!   stream [`SessionEvent`]s (feature `tokio-runtime`).
//!
//! ## Quick Start
//!
//! ```
//! use bingo_link::{GameSession, GridSize, Phase};
//!
//! let mut session = GameSession::offline(GridSize::new(5).unwrap());
//! let cells: Vec<String> = (1..=25).map(|n| n.to_string()).collect();
//! session.confirm_readiness(&cells).unwrap();
//! for n in 1..=5 {
//!     session.click_cell(n).unwrap();
//! }
//! assert_eq!(session.phase(), Phase::Playing);
//! ```

pub mod arbiter;
pub mod board;
pub mod config;
pub mod detector;
pub mod error;
pub mod error_codes;
pub mod event;
pub mod protocol;
pub mod room;
pub mod router;
pub mod session;
pub mod state;
pub mod transport;
pub mod transports;

#[cfg(feature = "tokio-runtime")]
pub mod guest;
#[cfg(feature = "tokio-runtime")]
pub mod host;
#[cfg(feature = "tokio-runtime")]
mod node;

// Re-export primary types for ergonomic imports.
pub use board::Board;
pub use config::BingoConfig;
pub use error::{BingoError, Result, ValidationError};
pub use error_codes::ErrorCode;
pub use event::SessionEvent;
pub use protocol::{GridSize, GuestMessage, HostMessage, Player, PlayerId};
pub use room::RoomCode;
pub use session::{GameSession, Outgoing, Role};
pub use state::{GameState, Phase};
pub use transport::{IncomingConnection, Transport};

#[cfg(feature = "tokio-runtime")]
pub use guest::GuestNode;
#[cfg(feature = "tokio-runtime")]
pub use host::HostNode;

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketListener, WebSocketTransport};
