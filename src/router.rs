//! Message dispatch for both roles.
//!
//! The host table ([`GameSession::handle_guest_message`]) turns guest intents
//! into authoritative broadcasts. The client table
//! ([`GameSession::apply_host_message`]) applies a broadcast to local state;
//! it runs on guests and, through the broadcaster, on the host itself.

use tracing::{debug, info, warn};

use crate::error_codes::ErrorCode;
use crate::event::SessionEvent;
use crate::protocol::{GuestMessage, HostMessage, Player, PlayerId};
use crate::session::{GameSession, Role};
use crate::state::Phase;

impl GameSession {
    /// Host table: handle one message from the guest connection `from`.
    ///
    /// Messages arriving on a non-host session, from connections that never
    /// joined, or in the wrong phase are dropped.
    pub fn handle_guest_message(&mut self, from: &PlayerId, message: GuestMessage) {
        if self.role != Role::Host {
            warn!(kind = message.kind(), "guest message on non-host session dropped");
            return;
        }
        debug!(%from, kind = message.kind(), "guest message");

        if let GuestMessage::Join { name } = message {
            self.handle_join(from, name);
            return;
        }
        if self.state.player(from).is_none() {
            warn!(%from, kind = message.kind(), "message from unknown sender dropped");
            return;
        }

        match message {
            GuestMessage::Join { .. } => {}
            GuestMessage::Ready => self.handle_ready(from),
            GuestMessage::ClickNumber { number } => self.handle_click(from, number),
            GuestMessage::Bingo { name } => {
                info!(%from, %name, "win claim received");
                self.register_claim(&name);
            }
            GuestMessage::RestartRequest => {
                info!(%from, "restart requested by guest");
                self.restart();
            }
        }
    }

    /// Host: accept a call of `number` by `player_id` and broadcast it.
    ///
    /// Numbers already called are ignored. The caller is not checked against
    /// the current turn.
    pub fn handle_turn(&mut self, player_id: &PlayerId, number: u32) {
        if self.state.is_called(number) {
            debug!(%player_id, number, "number already called");
            return;
        }
        let next_turn = self.state.next_turn();
        debug!(%player_id, number, next_turn, "number accepted");
        self.fan_out(HostMessage::NumberCalled { number, next_turn });
    }

    /// Host: the connection to `peer` closed.
    ///
    /// The player is removed and the new roster broadcast. In setup, losing
    /// the last unready player starts the game.
    pub fn handle_disconnect(&mut self, peer: &PlayerId) {
        self.connections.retain(|c| c != peer);
        if self.role != Role::Host || self.state.remove_player(peer).is_none() {
            return;
        }
        info!(%peer, "player left");
        self.emit(SessionEvent::PlayerLeft {
            player_id: peer.clone(),
        });

        if self.state.phase() == Phase::Setup && self.state.all_ready() {
            self.start_if_all_ready();
        } else {
            let players = self.state.players().to_vec();
            self.fan_out(HostMessage::SyncPlayers { players });
        }
    }

    /// Client table: apply one authoritative message to local state.
    pub fn apply_host_message(&mut self, message: HostMessage) {
        match message {
            HostMessage::SyncPlayers { players } => {
                self.state.replace_roster(players.clone());
                self.emit(SessionEvent::RosterUpdated { players });
            }
            HostMessage::StartSetup { grid_size } => {
                self.state.enter_setup(grid_size);
                self.board = None;
                self.emit(SessionEvent::SetupStarted { grid_size });
            }
            HostMessage::StartGame { players } => {
                self.state.start_round(players.clone());
                self.claimed_win = false;
                self.emit(SessionEvent::GameStarted { players });
            }
            HostMessage::NumberCalled { number, next_turn } => {
                if !self.state.record_call(number, next_turn) {
                    debug!(number, "duplicate NUMBER_CALLED ignored");
                    return;
                }
                self.emit(SessionEvent::NumberCalled {
                    number,
                    next_turn: self.state.turn_index(),
                });
                self.check_win();
            }
            HostMessage::GameOver { winner } => {
                info!(%winner, "game over");
                self.state.finish(winner.clone());
                self.emit(SessionEvent::GameOver { winner });
            }
            HostMessage::RestartGame => self.reset_game(),
            HostMessage::Error { msg, error_code } => {
                warn!(%msg, ?error_code, "host reported an error");
                self.emit(SessionEvent::Notice {
                    message: msg,
                    error_code,
                });
            }
        }
    }

    fn handle_join(&mut self, from: &PlayerId, name: String) {
        if self.state.phase() != Phase::Lobby {
            info!(%from, %name, "join rejected, game already active");
            self.send_to_peer(from, HostMessage::error(ErrorCode::GameAlreadyActive));
            return;
        }
        if from == &self.local_id {
            warn!(%from, "join with the host's own id rejected");
            self.send_to_peer(from, HostMessage::error(ErrorCode::UnavailableId));
            return;
        }
        if self.connections.contains(from) {
            debug!(%from, "repeated join ignored");
            return;
        }

        info!(%from, %name, "player joined");
        self.connections.push(from.clone());
        self.state.add_player(Player::new(from.clone(), name));
        let players = self.state.players().to_vec();
        self.fan_out(HostMessage::SyncPlayers { players });
    }

    fn handle_ready(&mut self, from: &PlayerId) {
        if self.state.phase() != Phase::Setup {
            warn!(%from, phase = ?self.state.phase(), "READY outside setup dropped");
            return;
        }
        if !self.state.mark_ready(from) {
            debug!(%from, "player already ready");
            return;
        }
        self.start_if_all_ready();
    }

    fn handle_click(&mut self, from: &PlayerId, number: u32) {
        if self.state.phase() != Phase::Playing {
            warn!(%from, number, "CLICK_NUMBER outside play dropped");
            return;
        }
        let max = self.state.config().grid_size.max_number();
        if !(1..=max).contains(&number) {
            warn!(%from, number, max, "CLICK_NUMBER out of range dropped");
            return;
        }
        self.handle_turn(from, number);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::protocol::GridSize;
    use crate::session::Outgoing;

    fn host() -> GameSession {
        GameSession::host(
            PlayerId::new("host"),
            "Hank",
            GridSize::new(5).unwrap(),
            Duration::from_millis(1500),
        )
    }

    fn sent_to(out: &[Outgoing], peer: &str) -> Vec<HostMessage> {
        out.iter()
            .filter_map(|o| match o {
                Outgoing::ToPeer { peer: p, message } if p.as_str() == peer => {
                    Some(message.clone())
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn join_in_lobby_broadcasts_roster() {
        let mut session = host();
        session.handle_guest_message(&PlayerId::new("g1"), GuestMessage::Join { name: "Gina".into() });

        assert_eq!(session.state().players().len(), 2);
        assert_eq!(session.connections(), &[PlayerId::new("g1")]);
        let out = session.drain_outgoing();
        assert!(matches!(
            sent_to(&out, "g1").as_slice(),
            [HostMessage::SyncPlayers { players }] if players.len() == 2
        ));
    }

    #[test]
    fn repeated_join_is_a_no_op() {
        let mut session = host();
        let g1 = PlayerId::new("g1");
        session.handle_guest_message(&g1, GuestMessage::Join { name: "Gina".into() });
        session.drain_outgoing();
        session.handle_guest_message(&g1, GuestMessage::Join { name: "Gina".into() });
        assert_eq!(session.state().players().len(), 2);
        assert!(session.drain_outgoing().is_empty());
    }

    #[test]
    fn join_after_lobby_gets_error_only() {
        let mut session = host();
        session.trigger_setup().unwrap();
        session.drain_outgoing();

        let late = PlayerId::new("late");
        session.handle_guest_message(&late, GuestMessage::Join { name: "Lee".into() });
        assert_eq!(session.state().players().len(), 1);
        assert!(session.connections().is_empty());
        assert_eq!(
            session.drain_outgoing(),
            vec![Outgoing::ToPeer {
                peer: late,
                message: HostMessage::error(ErrorCode::GameAlreadyActive),
            }]
        );
    }

    #[test]
    fn join_with_host_id_is_rejected() {
        let mut session = host();
        session.handle_guest_message(&PlayerId::new("host"), GuestMessage::Join { name: "X".into() });
        assert_eq!(session.state().players().len(), 1);
        assert!(matches!(
            session.drain_outgoing().as_slice(),
            [Outgoing::ToPeer {
                message: HostMessage::Error { .. },
                ..
            }]
        ));
    }

    #[test]
    fn unknown_sender_is_dropped() {
        let mut session = host();
        session.trigger_setup().unwrap();
        session.drain_outgoing();
        session.handle_guest_message(&PlayerId::new("ghost"), GuestMessage::Ready);
        assert!(session.drain_outgoing().is_empty());
    }

    #[test]
    fn ready_outside_setup_is_dropped() {
        let mut session = host();
        let g1 = PlayerId::new("g1");
        session.handle_guest_message(&g1, GuestMessage::Join { name: "Gina".into() });
        session.drain_outgoing();
        session.handle_guest_message(&g1, GuestMessage::Ready);
        assert!(!session.state().player(&g1).unwrap().is_ready);
        assert!(session.drain_outgoing().is_empty());
    }

    #[test]
    fn last_ready_starts_the_game() {
        let mut session = host();
        let g1 = PlayerId::new("g1");
        session.handle_guest_message(&g1, GuestMessage::Join { name: "Gina".into() });
        session.trigger_setup().unwrap();
        let cells: Vec<String> = (1..=25).map(|n: u32| n.to_string()).collect();
        session.confirm_readiness(&cells).unwrap();
        assert_eq!(session.phase(), Phase::Setup);
        session.drain_outgoing();

        session.handle_guest_message(&g1, GuestMessage::Ready);
        assert_eq!(session.phase(), Phase::Playing);
        assert!(matches!(
            sent_to(&session.drain_outgoing(), "g1").as_slice(),
            [HostMessage::StartGame { .. }]
        ));
    }

    #[test]
    fn disconnect_in_setup_can_start_the_game() {
        let mut session = host();
        let g1 = PlayerId::new("g1");
        let g2 = PlayerId::new("g2");
        session.handle_guest_message(&g1, GuestMessage::Join { name: "Gina".into() });
        session.handle_guest_message(&g2, GuestMessage::Join { name: "Gus".into() });
        session.trigger_setup().unwrap();
        session.confirm_readiness(&(1..=25).map(|n: u32| n.to_string()).collect::<Vec<_>>()).unwrap();
        session.handle_guest_message(&g1, GuestMessage::Ready);
        session.drain_outgoing();

        session.handle_disconnect(&g2);
        assert_eq!(session.phase(), Phase::Playing);
        assert_eq!(session.state().players().len(), 2);
        let out = session.drain_outgoing();
        assert!(sent_to(&out, "g2").is_empty());
        assert!(matches!(sent_to(&out, "g1").as_slice(), [HostMessage::StartGame { .. }]));
    }

    #[test]
    fn click_is_broadcast_and_turn_advances() {
        let mut session = host();
        let g1 = PlayerId::new("g1");
        session.handle_guest_message(&g1, GuestMessage::Join { name: "Gina".into() });
        session.trigger_setup().unwrap();
        session.confirm_readiness(&(1..=25).map(|n: u32| n.to_string()).collect::<Vec<_>>()).unwrap();
        session.handle_guest_message(&g1, GuestMessage::Ready);
        session.drain_outgoing();

        // Out of range and duplicate calls change nothing.
        session.handle_guest_message(&g1, GuestMessage::ClickNumber { number: 0 });
        session.handle_guest_message(&g1, GuestMessage::ClickNumber { number: 26 });
        assert!(session.drain_outgoing().is_empty());

        session.handle_guest_message(&g1, GuestMessage::ClickNumber { number: 12 });
        session.handle_guest_message(&g1, GuestMessage::ClickNumber { number: 12 });
        assert_eq!(session.state().called(), &[12]);
        assert_eq!(session.state().turn_index(), 1);
        assert_eq!(
            sent_to(&session.drain_outgoing(), "g1"),
            vec![HostMessage::NumberCalled {
                number: 12,
                next_turn: 1
            }]
        );
    }

    #[test]
    fn simultaneous_claims_end_in_a_joint_win() {
        let mut session = host();
        let g1 = PlayerId::new("g1");
        let g2 = PlayerId::new("g2");
        session.handle_guest_message(&g1, GuestMessage::Join { name: "Gina".into() });
        session.handle_guest_message(&g2, GuestMessage::Join { name: "Gus".into() });
        session.trigger_setup().unwrap();
        session.confirm_readiness(&(1..=25).map(|n: u32| n.to_string()).collect::<Vec<_>>()).unwrap();
        session.handle_guest_message(&g1, GuestMessage::Ready);
        session.handle_guest_message(&g2, GuestMessage::Ready);
        session.drain_outgoing();

        session.handle_guest_message(&g1, GuestMessage::Bingo { name: "Gina".into() });
        session.handle_guest_message(&g2, GuestMessage::Bingo { name: "Gus".into() });
        let deadline = session.next_deadline().unwrap();

        session.poll_timers(deadline - Duration::from_millis(1));
        assert_eq!(session.phase(), Phase::Playing);
        session.poll_timers(deadline);
        assert_eq!(session.phase(), Phase::GameOver);
        assert_eq!(session.state().winner(), Some("Gina & Gus"));

        // Late claims after the window are ignored.
        session.handle_guest_message(&g1, GuestMessage::Bingo { name: "Gina".into() });
        assert!(session.next_deadline().is_none());
        session.poll_timers(Instant::now() + Duration::from_secs(10));
        assert_eq!(session.state().winner(), Some("Gina & Gus"));
    }

    #[test]
    fn guest_restart_request_resets_everyone() {
        let mut session = host();
        let g1 = PlayerId::new("g1");
        session.handle_guest_message(&g1, GuestMessage::Join { name: "Gina".into() });
        session.trigger_setup().unwrap();
        session.confirm_readiness(&(1..=25).map(|n: u32| n.to_string()).collect::<Vec<_>>()).unwrap();
        session.handle_guest_message(&g1, GuestMessage::Ready);
        session.handle_guest_message(&g1, GuestMessage::ClickNumber { number: 3 });
        session.handle_guest_message(&g1, GuestMessage::Bingo { name: "Gina".into() });
        session.drain_outgoing();

        session.handle_guest_message(&g1, GuestMessage::RestartRequest);
        assert_eq!(session.phase(), Phase::Setup);
        assert!(session.state().called().is_empty());
        assert!(session.next_deadline().is_none());
        assert!(session.board().is_none());
        assert!(session.state().players().iter().all(|p| !p.is_ready));

        let to_guest = sent_to(&session.drain_outgoing(), "g1");
        assert!(matches!(
            to_guest.as_slice(),
            [
                HostMessage::RestartGame,
                HostMessage::SyncPlayers { .. },
                HostMessage::StartSetup { .. }
            ]
        ));
    }

    #[test]
    fn guest_applies_error_as_notice() {
        let mut session = GameSession::guest(PlayerId::new("g1"), "Gina");
        session.apply_host_message(HostMessage::error(ErrorCode::GameAlreadyActive));
        assert_eq!(
            session.drain_events(),
            vec![SessionEvent::Notice {
                message: "Game already active".into(),
                error_code: Some(ErrorCode::GameAlreadyActive),
            }]
        );
    }

    #[test]
    fn roster_sync_clamps_turn() {
        let mut session = GameSession::guest(PlayerId::new("g1"), "Gina");
        let players: Vec<Player> = ["a", "b", "g1"]
            .iter()
            .map(|id| Player::new(PlayerId::new(*id), *id))
            .collect();
        session.apply_host_message(HostMessage::StartGame {
            players: players.clone(),
        });
        session.apply_host_message(HostMessage::NumberCalled {
            number: 1,
            next_turn: 2,
        });
        session.apply_host_message(HostMessage::SyncPlayers {
            players: players[..2].to_vec(),
        });
        assert_eq!(session.state().turn_index(), 0);
    }
}
