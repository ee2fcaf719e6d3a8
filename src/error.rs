//! Error types for the bingo engine.

use thiserror::Error;

use crate::state::Phase;

/// Reasons a board entry is rejected by [`validate`](crate::board::validate).
///
/// Indices are zero-based cell positions in row-major order. Only the first
/// offending cell is reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A cell is empty or does not parse as an integer.
    #[error("cell {index} is empty or not a whole number")]
    IncompleteInput { index: usize },

    /// A value lies outside `1..=max`.
    #[error("cell {index} holds {value}, numbers must be between 1 and {max}")]
    OutOfRange { index: usize, value: i64, max: u32 },

    /// A value already appeared in an earlier cell.
    #[error("duplicate number {value} in cell {index}, each number must be unique")]
    DuplicateValue { index: usize, value: u32 },

    /// More cells were supplied than the grid has.
    #[error("expected {expected} cells, got {actual}")]
    WrongCellCount { expected: usize, actual: usize },
}

/// Errors that can occur while driving a bingo session.
#[derive(Debug, Error)]
pub enum BingoError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The session loop is gone, so the command could not be delivered.
    #[error("not connected to a room")]
    NotConnected,

    /// A host-only operation was attempted by a guest or offline session.
    #[error("only the host can do that")]
    NotHost,

    /// An offline-only operation was attempted in a networked room.
    #[error("only an offline game can do that")]
    NotOffline,

    /// The operation is not allowed in the current phase.
    #[error("not allowed during {actual:?}, expected {expected:?}")]
    InvalidPhase { expected: Phase, actual: Phase },

    /// Someone else holds the current turn.
    #[error("not your turn")]
    NotYourTurn,

    /// The clicked number is not on the local board.
    #[error("number {0} is not on your board")]
    NotOnBoard(u32),

    /// Grid dimension outside `5..=10`.
    #[error("grid size {0} is outside 5..=10")]
    InvalidGridSize(u32),

    /// A typed room code could not be parsed.
    #[error("invalid room code: {0:?}")]
    InvalidRoomCode(String),

    /// The room (or its host) could not be found.
    #[error("room not found: {0}")]
    PeerUnavailable(String),

    /// The endpoint for this room code is already taken.
    #[error("room code already in use: {0}")]
    EndpointInUse(String),

    /// The board failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BingoError {
    /// Maps the error to the structured code surfaced to users, if it has one.
    pub fn code(&self) -> Option<crate::ErrorCode> {
        use crate::ErrorCode;
        match self {
            Self::PeerUnavailable(_) => Some(ErrorCode::PeerUnavailable),
            Self::EndpointInUse(_) => Some(ErrorCode::UnavailableId),
            Self::InvalidRoomCode(_) => Some(ErrorCode::InvalidRoomCode),
            Self::NotHost => Some(ErrorCode::NotHost),
            Self::Serialization(_) => Some(ErrorCode::InvalidMessage),
            Self::TransportSend(_)
            | Self::TransportReceive(_)
            | Self::TransportClosed
            | Self::Timeout
            | Self::Io(_) => Some(ErrorCode::ConnectionError),
            _ => None,
        }
    }
}

/// A specialized [`Result`] type for bingo operations.
pub type Result<T> = std::result::Result<T, BingoError>;
