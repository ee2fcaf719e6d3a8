//! Wire protocol for the bingo room.
//!
//! Every message is a flat JSON object whose `type` tag names the variant in
//! `SCREAMING_SNAKE_CASE`, with camelCase payload fields:
//!
//! ```text
//! {"type":"JOIN","name":"Alice"}
//! {"type":"NUMBER_CALLED","number":7,"nextTurn":1}
//! ```
//!
//! [`GuestMessage`] is what a guest sends to the host; [`HostMessage`] is what
//! the host broadcasts (and applies to itself).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BingoError;
use crate::error_codes::ErrorCode;

// ── Identifiers ─────────────────────────────────────────────────────

/// Opaque connection identifier, unique within a room.
///
/// The host uses its room endpoint name; guests pick a random one before
/// connecting and announce it in the transport handshake.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random identifier for a guest connection.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// ── Roster ──────────────────────────────────────────────────────────

/// A participant in the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub is_ready: bool,
}

impl Player {
    /// A freshly joined player, not yet ready.
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            is_ready: false,
        }
    }
}

// ── Grid configuration ──────────────────────────────────────────────

/// Grid dimension, always within `5..=10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct GridSize(u8);

impl GridSize {
    pub const MIN: u32 = 5;
    pub const MAX: u32 = 10;

    /// Validate a grid dimension.
    ///
    /// # Errors
    ///
    /// Returns [`BingoError::InvalidGridSize`] outside `5..=10`.
    pub fn new(size: u32) -> Result<Self, BingoError> {
        if (Self::MIN..=Self::MAX).contains(&size) {
            // Bounded by MAX above, so the narrowing is lossless.
            Ok(Self(size as u8))
        } else {
            Err(BingoError::InvalidGridSize(size))
        }
    }

    /// Lenient parse used by the offline size prompt: anything unreadable or
    /// too small becomes 5, anything too large becomes 10.
    pub fn from_prompt(input: &str) -> Self {
        match input.trim().parse::<i64>() {
            Ok(n) if n > i64::from(Self::MAX) => Self(Self::MAX as u8),
            Ok(n) if n >= i64::from(Self::MIN) => Self(n as u8),
            _ => Self::default(),
        }
    }

    /// Cells per side.
    pub fn get(self) -> usize {
        usize::from(self.0)
    }

    /// Total number of cells, `n²`.
    pub fn cells(self) -> usize {
        self.get() * self.get()
    }

    /// Largest number that may appear on a board, also `n²`.
    pub fn max_number(self) -> u32 {
        u32::from(self.0) * u32::from(self.0)
    }
}

impl Default for GridSize {
    fn default() -> Self {
        Self(Self::MIN as u8)
    }
}

impl TryFrom<u32> for GridSize {
    type Error = BingoError;

    fn try_from(size: u32) -> Result<Self, Self::Error> {
        Self::new(size)
    }
}

impl From<GridSize> for u32 {
    fn from(size: GridSize) -> Self {
        u32::from(size.0)
    }
}

impl fmt::Display for GridSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{0}x{0}", self.0)
    }
}

/// Round configuration chosen by the host (or the offline player).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameConfig {
    pub grid_size: GridSize,
    /// Completed lines needed to win; equals the grid size.
    pub lines_to_win: usize,
}

impl GameConfig {
    pub fn new(grid_size: GridSize) -> Self {
        Self {
            grid_size,
            lines_to_win: grid_size.get(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::new(GridSize::default())
    }
}

// ── Messages ────────────────────────────────────────────────────────

/// Intent messages sent from a guest to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuestMessage {
    /// Ask to be added to the roster. Rejected once the room left the lobby.
    Join { name: String },
    /// The sender confirmed a valid board.
    Ready,
    /// The sender picked a number on its turn.
    ClickNumber { number: u32 },
    /// The sender completed enough lines.
    Bingo { name: String },
    /// Ask the host to restart the round.
    RestartRequest,
}

impl GuestMessage {
    /// Wire tag of the variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "JOIN",
            Self::Ready => "READY",
            Self::ClickNumber { .. } => "CLICK_NUMBER",
            Self::Bingo { .. } => "BINGO",
            Self::RestartRequest => "RESTART_REQUEST",
        }
    }
}

/// Authoritative messages broadcast by the host and applied by every peer,
/// the host included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostMessage {
    /// Full roster replacement.
    SyncPlayers { players: Vec<Player> },
    /// Configure the grid and enter setup.
    StartSetup {
        #[serde(rename = "gridSize")]
        grid_size: GridSize,
    },
    /// Everybody is ready; the roster order is the turn order.
    StartGame { players: Vec<Player> },
    /// A number was accepted; `next_turn` indexes the roster.
    NumberCalled {
        number: u32,
        #[serde(rename = "nextTurn")]
        next_turn: usize,
    },
    /// The round ended. Joint winners are joined with `" & "`.
    GameOver { winner: String },
    /// Reset to setup for a new round.
    RestartGame,
    /// Informational rejection sent to a single guest.
    Error {
        msg: String,
        #[serde(
            rename = "errorCode",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        error_code: Option<ErrorCode>,
    },
}

impl HostMessage {
    /// An `ERROR` reply carrying `code` and its description.
    pub fn error(code: ErrorCode) -> Self {
        Self::Error {
            msg: code.description().to_string(),
            error_code: Some(code),
        }
    }

    /// Wire tag of the variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SyncPlayers { .. } => "SYNC_PLAYERS",
            Self::StartSetup { .. } => "START_SETUP",
            Self::StartGame { .. } => "START_GAME",
            Self::NumberCalled { .. } => "NUMBER_CALLED",
            Self::GameOver { .. } => "GAME_OVER",
            Self::RestartGame => "RESTART_GAME",
            Self::Error { .. } => "ERROR",
        }
    }
}
