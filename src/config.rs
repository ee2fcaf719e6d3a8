//! Runtime configuration shared by [`HostNode`](crate::host::HostNode) and
//! [`GuestNode`](crate::guest::GuestNode).

use std::time::Duration;

use crate::arbiter::DEFAULT_WIN_WINDOW;
use crate::protocol::GridSize;

/// Default capacity of the bounded event channel.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for a hosted or joined room.
///
/// The only required field is the player's display name; all others have
/// defaults.
///
/// # Example
///
/// ```
/// use bingo_link::config::BingoConfig;
/// use bingo_link::protocol::GridSize;
/// use std::time::Duration;
///
/// let config = BingoConfig::new("Alice")
///     .with_grid_size(GridSize::new(7).unwrap())
///     .with_event_channel_capacity(0);
/// assert_eq!(config.player_name, "Alice");
/// assert_eq!(config.event_channel_capacity, 1);
/// assert_eq!(config.win_window, Duration::from_millis(1500));
/// ```
#[derive(Debug, Clone)]
pub struct BingoConfig {
    /// Display name announced in `JOIN` and used for win claims.
    pub player_name: String,
    /// Grid dimension the host configures for every round. Ignored by guests,
    /// which take the host's value from `START_SETUP`.
    pub grid_size: GridSize,
    /// How long the host keeps the win window open after the first claim.
    ///
    /// Defaults to **1500 ms**.
    pub win_window: Duration,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer falls behind, events are dropped with a warning so
    /// the session loop never blocks. `Disconnected` is always delivered.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Time the session loop gets to close its transports on
    /// [`shutdown`](crate::host::HostNode::shutdown) before it is aborted.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl BingoConfig {
    pub fn new(player_name: impl Into<String>) -> Self {
        Self {
            player_name: player_name.into(),
            grid_size: GridSize::default(),
            win_window: DEFAULT_WIN_WINDOW,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_grid_size(mut self, grid_size: GridSize) -> Self {
        self.grid_size = grid_size;
        self
    }

    #[must_use]
    pub fn with_win_window(mut self, window: Duration) -> Self {
        self.win_window = window;
        self
    }

    /// Set the capacity of the bounded event channel. Values below 1 are
    /// clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// A zero timeout aborts the session loop without a graceful close.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}
