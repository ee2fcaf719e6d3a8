//! Room codes and the endpoint names derived from them.

use std::fmt;
use std::str::FromStr;

use rand::Rng;

use crate::error::{BingoError, Result};
use crate::protocol::PlayerId;

/// Prefix of every room endpoint name.
pub const ENDPOINT_PREFIX: &str = "bingo-pwa-";

/// Short code a host shares so guests can find the room.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomCode(String);

impl RoomCode {
    /// A fresh two-digit code in `10..=99`.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.random_range(10..=99u32).to_string())
    }

    /// Parse a typed code: surrounding whitespace is ignored and letters are
    /// upper-cased.
    ///
    /// # Errors
    ///
    /// [`BingoError::InvalidRoomCode`] unless exactly two characters remain.
    pub fn parse(input: &str) -> Result<Self> {
        let code = input.trim().to_uppercase();
        if code.chars().count() == 2 {
            Ok(Self(code))
        } else {
            Err(BingoError::InvalidRoomCode(input.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `bingo-pwa-<code>`: the host's player id and WebSocket path.
    pub fn endpoint_name(&self) -> String {
        format!("{ENDPOINT_PREFIX}{}", self.0)
    }

    /// The host's player id in this room.
    pub fn host_id(&self) -> PlayerId {
        PlayerId::new(self.endpoint_name())
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RoomCode {
    type Err = BingoError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
