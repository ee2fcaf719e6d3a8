//! The per-process game session.
//!
//! [`GameSession`] is a plain value with no I/O: local input and inbound
//! messages are method calls, and every effect is queued as an [`Outgoing`]
//! message or a [`SessionEvent`]. Callers (the async runtimes, tests, an
//! offline front end) drain both queues after each call.
//!
//! Host-only state changes reach the network through one path,
//! [`GameSession::broadcast`], which sends to every registered guest and then
//! applies the same message locally through the client table in
//! [`router`](crate::router). Host and guests therefore run identical
//! transition code.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::arbiter::{WinArbiter, DEFAULT_WIN_WINDOW};
use crate::board::{validate, Board};
use crate::detector::detect;
use crate::error::{BingoError, Result, ValidationError};
use crate::event::SessionEvent;
use crate::protocol::{GameConfig, GridSize, GuestMessage, HostMessage, Player, PlayerId};
use crate::state::{GameState, Phase};

/// Player id used by an offline session.
pub const OFFLINE_ID: &str = "me";
/// Display name of the offline player, also the offline winner text.
pub const OFFLINE_NAME: &str = "You";

/// Which side of the room this process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Guest,
    Offline,
}

/// A message the session wants delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// Host → one guest connection.
    ToPeer { peer: PlayerId, message: HostMessage },
    /// Guest → host.
    ToHost(GuestMessage),
}

/// State of one participant's view of a room.
#[derive(Debug)]
pub struct GameSession {
    pub(crate) role: Role,
    pub(crate) local_id: PlayerId,
    pub(crate) local_name: String,
    pub(crate) state: GameState,
    pub(crate) board: Option<Board>,
    /// Latched once this guest has sent `BINGO` for the round.
    pub(crate) claimed_win: bool,
    pub(crate) arbiter: WinArbiter,
    /// Guest connections registered by an accepted `JOIN`, host only.
    pub(crate) connections: Vec<PlayerId>,
    pub(crate) outbox: VecDeque<Outgoing>,
    pub(crate) events: VecDeque<SessionEvent>,
}

impl GameSession {
    fn with_role(role: Role, local_id: PlayerId, local_name: String, config: GameConfig) -> Self {
        Self {
            role,
            local_id,
            local_name,
            state: GameState::new(config),
            board: None,
            claimed_win: false,
            arbiter: WinArbiter::new(DEFAULT_WIN_WINDOW),
            connections: Vec::new(),
            outbox: VecDeque::new(),
            events: VecDeque::new(),
        }
    }

    /// A hosting session in the lobby, with the host as the only player.
    pub fn host(
        local_id: PlayerId,
        name: impl Into<String>,
        grid_size: GridSize,
        win_window: Duration,
    ) -> Self {
        let name = name.into();
        let mut session =
            Self::with_role(Role::Host, local_id.clone(), name.clone(), GameConfig::new(grid_size));
        session.arbiter = WinArbiter::new(win_window);
        session.state.add_player(Player::new(local_id, name));
        session.emit(SessionEvent::RosterUpdated {
            players: session.state.players().to_vec(),
        });
        info!(id = %session.local_id, %grid_size, "hosting room");
        session
    }

    /// A guest session waiting in the lobby. Call [`join`](Self::join) once
    /// the host connection is open.
    pub fn guest(local_id: PlayerId, name: impl Into<String>) -> Self {
        Self::with_role(Role::Guest, local_id, name.into(), GameConfig::default())
    }

    /// A single-player session that starts directly in setup.
    pub fn offline(grid_size: GridSize) -> Self {
        let mut session = Self::with_role(
            Role::Offline,
            PlayerId::new(OFFLINE_ID),
            OFFLINE_NAME.to_string(),
            GameConfig::new(grid_size),
        );
        session
            .state
            .replace_roster(vec![Player::new(PlayerId::new(OFFLINE_ID), OFFLINE_NAME)]);
        session.state.enter_setup(grid_size);
        session.emit(SessionEvent::SetupStarted { grid_size });
        session
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn local_id(&self) -> &PlayerId {
        &self.local_id
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// The local board, once confirmed for this round.
    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    /// Guest connections that joined the room (host only).
    pub fn connections(&self) -> &[PlayerId] {
        &self.connections
    }

    pub fn has_claimed_win(&self) -> bool {
        self.claimed_win
    }

    /// Offline players always hold the turn.
    pub fn is_my_turn(&self) -> bool {
        self.role == Role::Offline
            || self
                .state
                .current_turn()
                .is_some_and(|p| p.id == self.local_id)
    }

    /// When the open win window closes, if one is open.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.arbiter.deadline()
    }

    /// Take every queued outgoing message, oldest first.
    pub fn drain_outgoing(&mut self) -> Vec<Outgoing> {
        self.outbox.drain(..).collect()
    }

    /// Take every queued event, oldest first.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain(..).collect()
    }

    // ── Local input ─────────────────────────────────────────────────

    /// Announce this guest to the host.
    pub fn join(&mut self) {
        if self.role == Role::Guest {
            self.outbox.push_back(Outgoing::ToHost(GuestMessage::Join {
                name: self.local_name.clone(),
            }));
        } else {
            debug!(role = ?self.role, "join ignored outside guest role");
        }
    }

    /// Move every participant from the lobby into setup.
    ///
    /// # Errors
    ///
    /// [`BingoError::NotHost`] for guests and offline sessions,
    /// [`BingoError::InvalidPhase`] once the room has left the lobby. Later
    /// setups go through [`request_restart`](Self::request_restart), which
    /// also clears readiness.
    pub fn trigger_setup(&mut self) -> Result<()> {
        self.require_host()?;
        self.require_phase(Phase::Lobby)?;
        let grid_size = self.state.config().grid_size;
        self.fan_out(HostMessage::StartSetup { grid_size });
        Ok(())
    }

    /// Validate raw cell input and confirm it as this round's board.
    ///
    /// Validation failures change nothing and send nothing.
    ///
    /// # Errors
    ///
    /// [`BingoError::InvalidPhase`] outside setup, or
    /// [`BingoError::Validation`] for a bad board.
    pub fn confirm_readiness<S: AsRef<str>>(&mut self, cells: &[S]) -> Result<()> {
        self.require_phase(Phase::Setup)?;
        let board = validate(cells, self.state.config().grid_size)?;
        self.confirm_board(board)
    }

    /// Confirm an already validated board (e.g. [`Board::random`]).
    ///
    /// # Errors
    ///
    /// [`BingoError::InvalidPhase`] outside setup, or
    /// [`BingoError::Validation`] if the board was built for another grid size.
    pub fn confirm_board(&mut self, board: Board) -> Result<()> {
        self.require_phase(Phase::Setup)?;
        let grid_size = self.state.config().grid_size;
        if board.grid_size() != grid_size {
            return Err(ValidationError::WrongCellCount {
                expected: grid_size.cells(),
                actual: board.grid_size().cells(),
            }
            .into());
        }

        self.board = Some(board);
        self.emit(SessionEvent::ReadyConfirmed);

        match self.role {
            Role::Offline => {
                let mut players = self.state.players().to_vec();
                for player in &mut players {
                    player.is_ready = true;
                }
                self.apply_host_message(HostMessage::StartGame { players });
            }
            Role::Host => {
                let local_id = self.local_id.clone();
                self.state.mark_ready(&local_id);
                self.start_if_all_ready();
            }
            Role::Guest => self.outbox.push_back(Outgoing::ToHost(GuestMessage::Ready)),
        }
        Ok(())
    }

    /// Call `number` from the local board.
    ///
    /// Clicking an already called number is a no-op. Turn ownership is
    /// checked only here; the host does not re-check it for guest clicks.
    ///
    /// # Errors
    ///
    /// [`BingoError::InvalidPhase`] outside play, [`BingoError::NotOnBoard`],
    /// or [`BingoError::NotYourTurn`].
    pub fn click_cell(&mut self, number: u32) -> Result<()> {
        self.require_phase(Phase::Playing)?;
        if self.state.is_called(number) {
            return Ok(());
        }
        if !self.board.as_ref().is_some_and(|b| b.contains(number)) {
            return Err(BingoError::NotOnBoard(number));
        }
        if !self.is_my_turn() {
            return Err(BingoError::NotYourTurn);
        }

        match self.role {
            Role::Host => {
                let local_id = self.local_id.clone();
                self.handle_turn(&local_id, number);
            }
            Role::Guest => self
                .outbox
                .push_back(Outgoing::ToHost(GuestMessage::ClickNumber { number })),
            Role::Offline => {
                if self.state.record_call(number, 0) {
                    self.emit(SessionEvent::NumberCalled {
                        number,
                        next_turn: 0,
                    });
                    self.check_win();
                }
            }
        }
        Ok(())
    }

    /// Start a new round.
    ///
    /// The host restarts everyone; a guest asks the host to; an offline
    /// session returns to setup with the same grid. Use
    /// [`restart_offline`](Self::restart_offline) to pick a new size.
    pub fn request_restart(&mut self) {
        match self.role {
            Role::Host => self.restart(),
            Role::Guest => self
                .outbox
                .push_back(Outgoing::ToHost(GuestMessage::RestartRequest)),
            Role::Offline => self.reset_game(),
        }
    }

    /// Offline restart with a freshly prompted grid size, e.g. from
    /// [`GridSize::from_prompt`].
    ///
    /// # Errors
    ///
    /// [`BingoError::NotOffline`] for hosts and guests; the grid of a hosted
    /// room is fixed when it is created.
    pub fn restart_offline(&mut self, grid_size: GridSize) -> Result<()> {
        if self.role != Role::Offline {
            return Err(BingoError::NotOffline);
        }
        self.clear_round();
        self.state.enter_setup(grid_size);
        self.emit(SessionEvent::SetupStarted { grid_size });
        Ok(())
    }

    /// Resolve the win window if it closed by `now`.
    pub fn poll_timers(&mut self, now: Instant) {
        if let Some(winner) = self.arbiter.poll_expired(now) {
            info!(%winner, "win window closed");
            self.fan_out(HostMessage::GameOver { winner });
        }
    }

    // ── Broadcaster ─────────────────────────────────────────────────

    /// Send `message` to every guest, then apply it locally.
    ///
    /// # Errors
    ///
    /// [`BingoError::NotHost`] unless this is the hosting session.
    pub fn broadcast(&mut self, message: HostMessage) -> Result<()> {
        self.require_host()?;
        self.fan_out(message);
        Ok(())
    }

    pub(crate) fn fan_out(&mut self, message: HostMessage) {
        debug!(kind = message.kind(), peers = self.connections.len(), "broadcast");
        self.send_to_guests(&message);
        self.apply_host_message(message);
    }

    pub(crate) fn send_to_guests(&mut self, message: &HostMessage) {
        for peer in &self.connections {
            self.outbox.push_back(Outgoing::ToPeer {
                peer: peer.clone(),
                message: message.clone(),
            });
        }
    }

    pub(crate) fn send_to_peer(&mut self, peer: &PlayerId, message: HostMessage) {
        self.outbox.push_back(Outgoing::ToPeer {
            peer: peer.clone(),
            message,
        });
    }

    // ── Shared transitions ──────────────────────────────────────────

    pub(crate) fn start_if_all_ready(&mut self) {
        if self.state.all_ready() {
            let players = self.state.players().to_vec();
            info!(players = players.len(), "everyone ready, starting game");
            self.fan_out(HostMessage::StartGame { players });
        } else {
            let players = self.state.players().to_vec();
            self.fan_out(HostMessage::SyncPlayers { players });
        }
    }

    /// Host-side claim registration, shared by remote `BINGO` and the host's
    /// own win so both land in the same window.
    pub(crate) fn register_claim(&mut self, name: &str) {
        if self.state.phase() != Phase::Playing {
            debug!(name, phase = ?self.state.phase(), "win claim outside play ignored");
            return;
        }
        self.arbiter.register_claim(name);
    }

    /// Host restart: tell the guests, then reset ourselves directly.
    pub(crate) fn restart(&mut self) {
        info!("restarting round");
        self.send_to_guests(&HostMessage::RestartGame);
        self.reset_game();
    }

    /// Clear the round and go back to setup.
    ///
    /// A guest waits for the host's `START_SETUP` before announcing setup.
    pub(crate) fn reset_game(&mut self) {
        self.clear_round();

        let grid_size = self.state.config().grid_size;
        match self.role {
            Role::Host => {
                let players = self.state.players().to_vec();
                self.fan_out(HostMessage::SyncPlayers { players });
                self.fan_out(HostMessage::StartSetup { grid_size });
            }
            Role::Offline => self.emit(SessionEvent::SetupStarted { grid_size }),
            Role::Guest => {}
        }
    }

    fn clear_round(&mut self) {
        self.arbiter.cancel();
        self.board = None;
        self.claimed_win = false;
        self.state.reset();
        self.emit(SessionEvent::Restarted);
    }

    /// Run the detector on the local board after a call.
    pub(crate) fn check_win(&mut self) {
        if self.state.phase() != Phase::Playing {
            return;
        }
        let Some(board) = &self.board else {
            return;
        };
        let report = detect(board, self.state.called());
        let won = report.is_win(self.state.config().lines_to_win);
        self.emit(SessionEvent::LinesUpdated {
            line_count: report.line_count,
            completed_cells: report.completed_cells,
        });
        if !won {
            return;
        }

        match self.role {
            Role::Offline => {
                self.state.finish(OFFLINE_NAME);
                self.emit(SessionEvent::GameOver {
                    winner: OFFLINE_NAME.to_string(),
                });
            }
            Role::Host => {
                let name = self.local_name.clone();
                self.register_claim(&name);
            }
            Role::Guest => {
                if !self.claimed_win {
                    info!(name = %self.local_name, "bingo, claiming win");
                    self.claimed_win = true;
                    self.outbox.push_back(Outgoing::ToHost(GuestMessage::Bingo {
                        name: self.local_name.clone(),
                    }));
                }
            }
        }
    }

    pub(crate) fn emit(&mut self, event: SessionEvent) {
        self.events.push_back(event);
    }

    fn require_host(&self) -> Result<()> {
        if self.role == Role::Host {
            Ok(())
        } else {
            Err(BingoError::NotHost)
        }
    }

    fn require_phase(&self, expected: Phase) -> Result<()> {
        let actual = self.state.phase();
        if actual == expected {
            Ok(())
        } else {
            Err(BingoError::InvalidPhase { expected, actual })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn five() -> GridSize {
        GridSize::new(5).unwrap()
    }

    fn row_major_cells() -> Vec<String> {
        (1..=25).map(|n: u32| n.to_string()).collect()
    }

    #[test]
    fn offline_round_plays_to_a_win() {
        let mut session = GameSession::offline(five());
        assert_eq!(session.phase(), Phase::Setup);
        session.confirm_readiness(&row_major_cells()).unwrap();
        assert_eq!(session.phase(), Phase::Playing);

        // Five rows complete five lines, which wins a 5x5 board.
        for number in 1..=25 {
            if session.phase() == Phase::GameOver {
                break;
            }
            session.click_cell(number).unwrap();
        }
        assert_eq!(session.phase(), Phase::GameOver);
        assert_eq!(session.state().winner(), Some(OFFLINE_NAME));
        assert!(session
            .drain_events()
            .contains(&SessionEvent::GameOver {
                winner: OFFLINE_NAME.into()
            }));
        assert!(session.drain_outgoing().is_empty());
    }

    #[test]
    fn offline_restart_keeps_grid_size() {
        let mut session = GameSession::offline(GridSize::new(6).unwrap());
        session
            .confirm_board(Board::random(GridSize::new(6).unwrap(), &mut rand::rng()))
            .unwrap();
        session.click_cell(session.board().unwrap().numbers()[0]).unwrap();

        session.request_restart();
        assert_eq!(session.phase(), Phase::Setup);
        assert!(session.state().called().is_empty());
        assert!(session.board().is_none());
        assert_eq!(session.state().config().grid_size.get(), 6);
    }

    #[test]
    fn offline_restart_takes_a_new_grid_size() {
        let mut session = GameSession::offline(five());
        session.confirm_readiness(&row_major_cells()).unwrap();
        session.click_cell(1).unwrap();
        session.drain_events();

        session.restart_offline(GridSize::from_prompt("8")).unwrap();
        assert_eq!(session.phase(), Phase::Setup);
        assert!(session.state().called().is_empty());
        assert_eq!(session.state().config().grid_size.get(), 8);
        assert_eq!(session.state().config().lines_to_win, 8);
        assert_eq!(
            session.drain_events(),
            vec![
                SessionEvent::Restarted,
                SessionEvent::SetupStarted {
                    grid_size: GridSize::new(8).unwrap()
                },
            ]
        );

        // The old 5x5 input no longer fits.
        assert!(session.confirm_readiness(&row_major_cells()).is_err());
        let cells: Vec<String> = (1..=64).map(|n: u32| n.to_string()).collect();
        session.confirm_readiness(&cells).unwrap();
        assert_eq!(session.phase(), Phase::Playing);
    }

    #[test]
    fn restart_offline_is_only_for_offline_sessions() {
        let mut session = GameSession::guest(PlayerId::new("g1"), "Gina");
        assert!(matches!(
            session.restart_offline(GridSize::new(7).unwrap()),
            Err(BingoError::NotOffline)
        ));
        assert_eq!(session.state().config().grid_size.get(), 5);
    }

    #[test]
    fn guest_announces_setup_once_per_restart() {
        let mut session = GameSession::guest(PlayerId::new("g1"), "Gina");
        session.apply_host_message(HostMessage::StartGame {
            players: vec![Player::new(PlayerId::new("g1"), "Gina")],
        });
        session.drain_events();

        // What a host restart delivers: RESTART_GAME, SYNC_PLAYERS, START_SETUP.
        session.apply_host_message(HostMessage::RestartGame);
        session.apply_host_message(HostMessage::SyncPlayers {
            players: vec![Player::new(PlayerId::new("g1"), "Gina")],
        });
        session.apply_host_message(HostMessage::StartSetup { grid_size: five() });

        let setups = session
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::SetupStarted { .. }))
            .count();
        assert_eq!(setups, 1);
        assert_eq!(session.phase(), Phase::Setup);
    }

    #[test]
    fn invalid_board_changes_nothing() {
        let mut session = GameSession::guest(PlayerId::new("g1"), "Gina");
        session.apply_host_message(HostMessage::StartSetup {
            grid_size: five(),
        });
        session.drain_events();

        let mut cells = row_major_cells();
        cells[5] = "1".into();
        let err = session.confirm_readiness(&cells).unwrap_err();
        assert!(matches!(
            err,
            BingoError::Validation(ValidationError::DuplicateValue { value: 1, .. })
        ));
        assert!(session.board().is_none());
        assert!(session.drain_outgoing().is_empty());
        assert!(session.drain_events().is_empty());
    }

    #[test]
    fn board_for_another_grid_is_rejected() {
        let mut session = GameSession::offline(five());
        let board = Board::random(GridSize::new(6).unwrap(), &mut rand::rng());
        assert!(matches!(
            session.confirm_board(board),
            Err(BingoError::Validation(ValidationError::WrongCellCount { .. }))
        ));
    }

    #[test]
    fn guest_ready_is_sent_to_host() {
        let mut session = GameSession::guest(PlayerId::new("g1"), "Gina");
        session.join();
        session.apply_host_message(HostMessage::StartSetup {
            grid_size: five(),
        });
        session.confirm_readiness(&row_major_cells()).unwrap();
        assert_eq!(
            session.drain_outgoing(),
            vec![
                Outgoing::ToHost(GuestMessage::Join {
                    name: "Gina".into()
                }),
                Outgoing::ToHost(GuestMessage::Ready),
            ]
        );
    }

    #[test]
    fn confirm_outside_setup_is_rejected() {
        let mut session = GameSession::guest(PlayerId::new("g1"), "Gina");
        assert!(matches!(
            session.confirm_readiness(&row_major_cells()),
            Err(BingoError::InvalidPhase {
                expected: Phase::Setup,
                actual: Phase::Lobby
            })
        ));
    }

    #[test]
    fn guest_cannot_broadcast_or_trigger_setup() {
        let mut session = GameSession::guest(PlayerId::new("g1"), "Gina");
        assert!(matches!(
            session.broadcast(HostMessage::RestartGame),
            Err(BingoError::NotHost)
        ));
        assert!(matches!(session.trigger_setup(), Err(BingoError::NotHost)));
    }

    #[test]
    fn guest_click_requires_turn() {
        let mut session = GameSession::guest(PlayerId::new("g1"), "Gina");
        session.apply_host_message(HostMessage::StartSetup {
            grid_size: five(),
        });
        session.confirm_readiness(&row_major_cells()).unwrap();
        session.drain_outgoing();

        let players = vec![
            Player::new(PlayerId::new("host"), "Hank"),
            Player::new(PlayerId::new("g1"), "Gina"),
        ];
        session.apply_host_message(HostMessage::StartGame { players });

        assert!(matches!(session.click_cell(3), Err(BingoError::NotYourTurn)));
        assert!(matches!(session.click_cell(99), Err(BingoError::NotOnBoard(99))));

        session.apply_host_message(HostMessage::NumberCalled {
            number: 7,
            next_turn: 1,
        });
        assert!(session.is_my_turn());
        session.click_cell(3).unwrap();
        // Already called: silently ignored.
        session.click_cell(7).unwrap();
        assert_eq!(
            session.drain_outgoing(),
            vec![Outgoing::ToHost(GuestMessage::ClickNumber { number: 3 })]
        );
    }

    #[test]
    fn guest_claims_win_once_per_round() {
        let mut session = GameSession::guest(PlayerId::new("g1"), "Gina");
        session.apply_host_message(HostMessage::StartSetup {
            grid_size: five(),
        });
        session.confirm_readiness(&row_major_cells()).unwrap();
        session.apply_host_message(HostMessage::StartGame {
            players: vec![Player::new(PlayerId::new("g1"), "Gina")],
        });
        session.drain_outgoing();

        for number in 1..=25 {
            session.apply_host_message(HostMessage::NumberCalled {
                number,
                next_turn: 0,
            });
        }
        let claims: Vec<_> = session
            .drain_outgoing()
            .into_iter()
            .filter(|o| matches!(o, Outgoing::ToHost(GuestMessage::Bingo { .. })))
            .collect();
        assert_eq!(claims.len(), 1);
        assert!(session.has_claimed_win());

        session.apply_host_message(HostMessage::RestartGame);
        assert!(!session.has_claimed_win());
    }
}
