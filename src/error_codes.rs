//! Structured error codes for notices shown to a participant.
//!
//! Codes travel inside the `ERROR` message and are also attached to local
//! transport failures. They serialize as `SCREAMING_SNAKE_CASE` strings
//! (e.g. `"GAME_ALREADY_ACTIVE"`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured error codes for protocol rejections and transport failures.
///
/// Use [`description()`](ErrorCode::description) for a human-readable explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Protocol rejections
    GameAlreadyActive,
    NotHost,
    InvalidMessage,

    // Room addressing
    InvalidRoomCode,
    PeerUnavailable,
    UnavailableId,

    // Transport
    ConnectionError,
}

impl ErrorCode {
    /// Returns a human-readable description of this error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::GameAlreadyActive => "Game already active",
            Self::NotHost => "Only the host can do that.",
            Self::InvalidMessage => "The message could not be understood.",
            Self::InvalidRoomCode => "Invalid Code",
            Self::PeerUnavailable => "Room not found! Check the code.",
            Self::UnavailableId => "This code is already in use. Try again.",
            Self::ConnectionError => "Connection Error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}
