//! Replicated game state: phase, roster, turn order and the call log.
//!
//! On the host this is the single source of truth. Guests hold a mirror that
//! is only mutated through the same transitions, driven by host broadcasts.

use tracing::debug;

use crate::protocol::{GameConfig, GridSize, Player, PlayerId};

/// Round phase.
///
/// `Lobby → Setup → Playing → GameOver → Setup (restart)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Lobby,
    Setup,
    Playing,
    GameOver,
}

/// Roster, turn order, called numbers and phase of one room.
#[derive(Debug, Clone, Default)]
pub struct GameState {
    phase: Phase,
    config: GameConfig,
    players: Vec<Player>,
    called: Vec<u32>,
    turn_index: usize,
    winner: Option<String>,
}

impl GameState {
    pub fn new(config: GameConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> GameConfig {
        self.config
    }

    /// Roster in turn order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Called numbers in authoritative call order.
    pub fn called(&self) -> &[u32] {
        &self.called
    }

    pub fn is_called(&self, number: u32) -> bool {
        self.called.contains(&number)
    }

    pub fn turn_index(&self) -> usize {
        self.turn_index
    }

    /// Player whose turn it is, if the roster is non-empty.
    pub fn current_turn(&self) -> Option<&Player> {
        self.players.get(self.turn_index)
    }

    /// Index the turn moves to after one accepted call.
    pub fn next_turn(&self) -> usize {
        match self.players.len() {
            0 => 0,
            len => (self.turn_index + 1) % len,
        }
    }

    /// Outcome of the finished round.
    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    pub fn all_ready(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| p.is_ready)
    }

    // ── Roster bookkeeping ──────────────────────────────────────────

    /// Replace the whole roster.
    ///
    /// The turn stays with its current holder if they are still present.
    /// If the holder left, the index is kept and wrapped into range, which
    /// is where [`remove_player`](Self::remove_player) leaves it too.
    pub fn replace_roster(&mut self, players: Vec<Player>) {
        let holder = self.current_turn().map(|p| p.id.clone());
        self.players = players;
        if let Some(index) = holder.and_then(|id| self.players.iter().position(|p| p.id == id)) {
            self.turn_index = index;
        }
        self.clamp_turn();
    }

    pub fn add_player(&mut self, player: Player) {
        debug!(id = %player.id, name = %player.name, "player added");
        self.players.push(player);
    }

    pub fn remove_player(&mut self, id: &PlayerId) -> Option<Player> {
        let index = self.players.iter().position(|p| &p.id == id)?;
        let removed = self.players.remove(index);
        if index < self.turn_index {
            self.turn_index -= 1;
        }
        self.clamp_turn();
        debug!(%id, "player removed");
        Some(removed)
    }

    /// Mark a player ready. Returns `false` if unknown or already ready.
    pub fn mark_ready(&mut self, id: &PlayerId) -> bool {
        match self.players.iter_mut().find(|p| &p.id == id) {
            Some(player) if !player.is_ready => {
                player.is_ready = true;
                true
            }
            _ => false,
        }
    }

    // ── Phase transitions ───────────────────────────────────────────

    /// Apply the round configuration and enter setup.
    pub fn enter_setup(&mut self, grid_size: GridSize) {
        self.config = GameConfig::new(grid_size);
        self.transition(Phase::Setup);
    }

    /// Start a round with `players` as the turn order.
    pub fn start_round(&mut self, players: Vec<Player>) {
        self.players = players;
        self.called.clear();
        self.turn_index = 0;
        self.winner = None;
        self.transition(Phase::Playing);
    }

    /// Append an accepted call and move the turn.
    ///
    /// Returns `false` (and changes nothing) if `number` was already called.
    pub fn record_call(&mut self, number: u32, next_turn: usize) -> bool {
        if self.is_called(number) {
            return false;
        }
        self.called.push(number);
        self.turn_index = next_turn;
        self.clamp_turn();
        true
    }

    pub fn finish(&mut self, winner: impl Into<String>) {
        self.winner = Some(winner.into());
        self.transition(Phase::GameOver);
    }

    /// Back to setup: clears the call log and every player's readiness.
    pub fn reset(&mut self) {
        self.called.clear();
        self.turn_index = 0;
        self.winner = None;
        for player in &mut self.players {
            player.is_ready = false;
        }
        self.transition(Phase::Setup);
    }

    fn transition(&mut self, to: Phase) {
        if self.phase != to {
            debug!(from = ?self.phase, ?to, "phase transition");
        }
        self.phase = to;
    }

    fn clamp_turn(&mut self) {
        if self.turn_index >= self.players.len() {
            self.turn_index = 0;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn roster(names: &[&str]) -> Vec<Player> {
        names
            .iter()
            .map(|n| Player::new(PlayerId::new(*n), *n))
            .collect()
    }

    #[test]
    fn starts_in_lobby() {
        let state = GameState::default();
        assert_eq!(state.phase(), Phase::Lobby);
        assert!(state.called().is_empty());
        assert!(!state.all_ready());
    }

    #[test]
    fn turn_advances_modulo_roster() {
        let mut state = GameState::default();
        state.start_round(roster(&["a", "b", "c"]));
        for (k, number) in (1..=7).enumerate() {
            let next = state.next_turn();
            assert!(state.record_call(number, next));
            assert_eq!(state.turn_index(), (k + 1) % 3);
        }
        assert_eq!(state.called().len(), 7);
    }

    #[test]
    fn duplicate_call_is_ignored() {
        let mut state = GameState::default();
        state.start_round(roster(&["a", "b"]));
        assert!(state.record_call(4, 1));
        assert!(!state.record_call(4, 0));
        assert_eq!(state.called(), &[4]);
        assert_eq!(state.turn_index(), 1);
    }

    #[test]
    fn removing_the_last_turn_holder_wraps_turn() {
        let mut state = GameState::default();
        state.start_round(roster(&["a", "b", "c"]));
        state.record_call(1, 2);
        state.remove_player(&PlayerId::new("c"));
        assert_eq!(state.turn_index(), 0);
        assert_eq!(state.current_turn().unwrap().name, "a");
    }

    #[test]
    fn removing_an_earlier_player_keeps_the_holder() {
        let mut state = GameState::default();
        state.start_round(roster(&["a", "b", "c"]));
        state.record_call(1, 2);
        state.remove_player(&PlayerId::new("a"));
        assert_eq!(state.turn_index(), 1);
        assert_eq!(state.current_turn().unwrap().name, "c");
    }

    #[test]
    fn roster_replacement_follows_the_holder() {
        let mut state = GameState::default();
        state.start_round(roster(&["a", "b", "c"]));
        state.record_call(1, 2);

        state.replace_roster(roster(&["b", "c"]));
        assert_eq!(state.current_turn().unwrap().name, "c");

        // The holder itself left: the index wraps like a removal does.
        state.replace_roster(roster(&["b"]));
        assert_eq!(state.current_turn().unwrap().name, "b");
    }

    #[test]
    fn mark_ready_is_idempotent() {
        let mut state = GameState::default();
        state.replace_roster(roster(&["a", "b"]));
        assert!(state.mark_ready(&PlayerId::new("a")));
        assert!(!state.mark_ready(&PlayerId::new("a")));
        assert!(!state.mark_ready(&PlayerId::new("zzz")));
        assert!(!state.all_ready());
        assert!(state.mark_ready(&PlayerId::new("b")));
        assert!(state.all_ready());
    }

    #[test]
    fn reset_returns_to_setup_and_clears_readiness() {
        let mut state = GameState::default();
        let mut players = roster(&["a", "b"]);
        players[0].is_ready = true;
        players[1].is_ready = true;
        state.start_round(players);
        state.record_call(9, 1);
        state.finish("a");

        state.reset();
        assert_eq!(state.phase(), Phase::Setup);
        assert!(state.called().is_empty());
        assert_eq!(state.turn_index(), 0);
        assert!(state.winner().is_none());
        assert!(state.players().iter().all(|p| !p.is_ready));
    }

    #[test]
    fn enter_setup_applies_grid_config() {
        let mut state = GameState::default();
        state.enter_setup(GridSize::new(8).unwrap());
        assert_eq!(state.phase(), Phase::Setup);
        assert_eq!(state.config().lines_to_win, 8);
    }
}
