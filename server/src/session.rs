//! The authoritative room: roster, lifecycle state machine and tick driver.
//!
//! A `Session` is a plain owned value. Every mutation happens through
//! `&mut self`, so whoever owns it (the network event loop, or a test)
//! serializes message handling and ticks without any locking.

use crate::client::{ClientHandle, ConnectionId};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    advance_players, apply_pivot, check_winner, clamp_delta, ClientPacket, Difficulty, Direction,
    GameEvent, MatchConfig, Player, ServerPacket, MAX_PLAYERS, MIN_PLAYERS,
};
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Waiting,
    Active,
    Ended,
}

/// Why a connection was turned away. The `Display` text is sent to the
/// client in the ERROR packet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("Room is full")]
    RoomFull,
    #[error("Match already in progress")]
    MatchInProgress,
}

/// Lifecycle commands that were not allowed in the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("At least two players are needed to start")]
    NotEnoughPlayers,
    #[error("Not allowed while the session is {0:?}")]
    InvalidState(SessionState),
    #[error("Connection {0} is not in the room")]
    UnknownConnection(ConnectionId),
}

/// A roster entry: the simulated player plus the connection it belongs to.
#[derive(Debug)]
pub struct Participant {
    pub player: Player,
    pub client: ClientHandle,
}

pub struct Session {
    participants: Vec<Participant>,
    state: SessionState,
    config: MatchConfig,
    winner: Option<u32>,
    // Time of the previous tick; `Some` exactly while the tick loop runs
    last_tick: Option<Instant>,
    next_player_id: u32,
    max_players: usize,
    tick: u64,
    rng: StdRng,
}

impl Session {
    pub fn new(config: MatchConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Builds a session with a caller-provided RNG, used for deterministic
    /// starting directions.
    pub fn with_rng(config: MatchConfig, rng: StdRng) -> Self {
        Self {
            participants: Vec::new(),
            state: SessionState::Waiting,
            config,
            winner: None,
            last_tick: None,
            next_player_id: 1,
            max_players: MAX_PLAYERS,
            tick: 0,
            rng,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> MatchConfig {
        self.config
    }

    /// Winner of the last finished match. Only meaningful in `Ended`.
    pub fn winner(&self) -> Option<u32> {
        self.winner
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// True while the tick loop should be driven.
    pub fn is_ticking(&self) -> bool {
        self.last_tick.is_some()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.participants.iter().map(|p| &p.player)
    }

    pub fn player(&self, player_id: u32) -> Option<&Player> {
        self.players().find(|player| player.id == player_id)
    }

    pub fn player_mut(&mut self, player_id: u32) -> Option<&mut Player> {
        self.participants
            .iter_mut()
            .map(|p| &mut p.player)
            .find(|player| player.id == player_id)
    }

    pub fn player_id_for(&self, conn: ConnectionId) -> Option<u32> {
        self.participants
            .iter()
            .find(|p| p.client.id == conn)
            .map(|p| p.player.id)
    }

    /// Admits a new connection to the lobby.
    ///
    /// On rejection the connection receives an ERROR packet followed by a
    /// close frame and is dropped; nobody else is affected.
    pub fn join(&mut self, client: ClientHandle) -> Result<u32, JoinError> {
        let rejection = if self.state != SessionState::Waiting {
            Some(JoinError::MatchInProgress)
        } else if self.participants.len() >= self.max_players {
            Some(JoinError::RoomFull)
        } else {
            None
        };

        if let Some(reason) = rejection {
            info!("Rejecting connection {} from {}: {}", client.id, client.addr, reason);
            client.send(&ServerPacket::Error {
                msg: reason.to_string(),
            });
            client.close();
            return Err(reason);
        }

        let player_id = self.next_player_id;
        self.next_player_id += 1;

        let player = Player::new(player_id, self.config.difficulty);
        info!(
            "Player {} joined from {} ({} in room)",
            player_id,
            client.addr,
            self.participants.len() + 1
        );

        client.send(&ServerPacket::Welcome { player_id });
        client.send(&self.settings_packet());
        self.participants.push(Participant { player, client });
        self.broadcast_roster();

        Ok(player_id)
    }

    /// Removes the participant owning `conn`, in any state.
    ///
    /// Returns false when the connection was never admitted.
    pub fn leave(&mut self, conn: ConnectionId) -> bool {
        let Some(index) = self.participants.iter().position(|p| p.client.id == conn) else {
            return false;
        };

        let participant = self.participants.remove(index);
        info!(
            "Player {} left after {:.1}s ({} remaining)",
            participant.player.id,
            participant.client.connected_for().as_secs_f64(),
            self.participants.len()
        );

        if self.participants.is_empty() {
            self.reset();
            return true;
        }

        if self.participants.len() < MIN_PLAYERS {
            match self.state {
                SessionState::Active => {
                    warn!("Match aborted: not enough players left");
                    self.stop_game();
                    self.state = SessionState::Waiting;
                    self.winner = None;
                    self.broadcast(&ServerPacket::MatchAborted {
                        reason: format!("Player {} disconnected", participant.player.id),
                    });
                }
                SessionState::Ended => {
                    self.state = SessionState::Waiting;
                    self.winner = None;
                }
                SessionState::Waiting => {}
            }
        }

        self.broadcast_roster();
        true
    }

    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Waiting {
            return Err(SessionError::InvalidState(self.state));
        }
        self.begin_match()
    }

    pub fn rematch(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Ended {
            return Err(SessionError::InvalidState(self.state));
        }
        self.begin_match()
    }

    pub fn set_difficulty(&mut self, difficulty: Difficulty) -> Result<(), SessionError> {
        if self.state != SessionState::Waiting {
            return Err(SessionError::InvalidState(self.state));
        }
        self.config.difficulty = difficulty;
        info!("Difficulty set to {:?}", difficulty);
        self.broadcast(&self.settings_packet());
        Ok(())
    }

    pub fn set_speed_ramp(&mut self, enabled: bool) -> Result<(), SessionError> {
        if self.state != SessionState::Waiting {
            return Err(SessionError::InvalidState(self.state));
        }
        self.config.speed_ramp = enabled;
        info!("Speed ramp {}", if enabled { "enabled" } else { "disabled" });
        self.broadcast(&self.settings_packet());
        Ok(())
    }

    /// Bounce input from a connection. Silently ignored unless the match is
    /// running and the sender's player is alive.
    pub fn input(&mut self, conn: ConnectionId) {
        if let Some(player_id) = self.player_id_for(conn) {
            self.on_bounce(player_id);
        }
    }

    pub fn on_bounce(&mut self, player_id: u32) {
        if self.state != SessionState::Active {
            return;
        }

        let event = match self.player_mut(player_id) {
            Some(player) => apply_pivot(player),
            None => None,
        };

        if let Some(event) = event {
            if let GameEvent::Death { .. } = &event {
                info!("Player {} eliminated by an empty bar", player_id);
            }
            self.broadcast(&ServerPacket::Event { payload: event });
        }
    }

    /// Routes one decoded inbound packet. Commands that are not allowed
    /// right now are logged and dropped.
    pub fn handle_packet(&mut self, conn: ConnectionId, packet: ClientPacket) {
        if let Err(e) = self.route(conn, packet) {
            debug!("Command from connection {} rejected: {}", conn, e);
        }
    }

    fn route(&mut self, conn: ConnectionId, packet: ClientPacket) -> Result<(), SessionError> {
        if self.player_id_for(conn).is_none() {
            return Err(SessionError::UnknownConnection(conn));
        }

        match packet {
            ClientPacket::Input => {
                self.input(conn);
                Ok(())
            }
            ClientPacket::Start => self.start(),
            ClientPacket::Rematch => self.rematch(),
            ClientPacket::SetDifficulty { difficulty } => self.set_difficulty(difficulty),
            ClientPacket::ToggleSpeedRamp { enabled } => self.set_speed_ramp(enabled),
        }
    }

    /// Timer callback: measures the wall-clock gap since the last tick and
    /// advances the simulation by it.
    pub fn on_tick(&mut self, now: Instant) {
        let Some(last) = self.last_tick else {
            return;
        };
        self.last_tick = Some(now);

        let elapsed = now.saturating_duration_since(last).as_secs_f64();
        let dt = clamp_delta(elapsed);
        if dt < elapsed {
            warn!("Tick stalled for {:.3}s, capping step to {:.3}s", elapsed, dt);
        }

        self.tick(dt);
    }

    /// Advances every live player by `dt` seconds, broadcasts the resulting
    /// events and snapshot, then checks for a winner.
    pub fn tick(&mut self, dt: f64) {
        if self.state != SessionState::Active {
            return;
        }

        let dt = clamp_delta(dt);
        self.tick += 1;

        let events: Vec<GameEvent> = advance_players(
            self.participants.iter_mut().map(|p| &mut p.player),
            &self.config,
            dt,
        );
        for event in events {
            if let GameEvent::Death { player_id, .. } = &event {
                info!("Player {} eliminated", player_id);
            }
            self.broadcast(&ServerPacket::Event { payload: event });
        }

        self.broadcast(&ServerPacket::Update {
            state: self.players().map(Player::snapshot).collect(),
        });

        if let Some(outcome) = check_winner(self.players()) {
            self.stop_game();
            self.winner = outcome.winner_id();
            match self.winner {
                Some(id) => info!("Player {} wins after {} ticks", id, self.tick),
                None => info!("Match ended in a draw after {} ticks", self.tick),
            }
            self.broadcast(&ServerPacket::GameOver {
                winner_id: self.winner,
            });
        }
    }

    /// Cancels the tick loop. A running match ends without a winner; calling
    /// this again, or with no match running, changes nothing.
    pub fn stop_game(&mut self) {
        if self.last_tick.take().is_some() {
            debug!("Tick loop stopped");
        }
        if self.state == SessionState::Active {
            self.state = SessionState::Ended;
            self.winner = None;
        }
    }

    /// Clears the roster and returns to an empty lobby. Remaining
    /// connections are closed and player ids start again from 1.
    pub fn reset(&mut self) {
        self.stop_game();
        for participant in self.participants.drain(..) {
            participant.client.close();
        }
        self.state = SessionState::Waiting;
        self.winner = None;
        self.next_player_id = 1;
        self.tick = 0;
        info!("Room reset");
    }

    fn begin_match(&mut self) -> Result<(), SessionError> {
        if self.participants.len() < MIN_PLAYERS {
            return Err(SessionError::NotEnoughPlayers);
        }

        let difficulty = self.config.difficulty;
        for participant in &mut self.participants {
            let direction = if self.rng.gen_bool(0.5) {
                Direction::Right
            } else {
                Direction::Left
            };
            participant.player.reset(difficulty, direction);
        }

        self.state = SessionState::Active;
        self.winner = None;
        self.tick = 0;
        self.last_tick = Some(Instant::now());

        info!(
            "Match started with {} players ({:?}, speed ramp {})",
            self.participants.len(),
            difficulty,
            self.config.speed_ramp
        );
        self.broadcast(&ServerPacket::GameStart);
        Ok(())
    }

    fn settings_packet(&self) -> ServerPacket {
        ServerPacket::Settings {
            difficulty: self.config.difficulty,
            speed_ramp: self.config.speed_ramp,
        }
    }

    fn broadcast_roster(&self) {
        self.broadcast(&ServerPacket::PlayerList {
            players: self.players().map(Player::summary).collect(),
        });
    }

    /// Encodes once and queues the frame on every participant's connection.
    fn broadcast(&self, packet: &ServerPacket) {
        let text = match packet.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode broadcast packet: {}", e);
                return;
            }
        };

        for participant in &self.participants {
            participant.client.send_text(text.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_test::{assert_err, assert_ok};
    use tokio_tungstenite::tungstenite::Message;

    const DT: f64 = 1.0 / 60.0;

    struct TestClient {
        conn: ConnectionId,
        rx: mpsc::Receiver<Message>,
    }

    impl TestClient {
        fn drain(&mut self) -> Vec<ServerPacket> {
            let mut packets = Vec::new();
            while let Ok(message) = self.rx.try_recv() {
                if let Message::Text(text) = message {
                    packets.push(ServerPacket::from_json(&text).unwrap());
                }
            }
            packets
        }

        fn saw_close(&mut self) -> bool {
            let mut closed = false;
            while let Ok(message) = self.rx.try_recv() {
                closed |= matches!(message, Message::Close(_));
            }
            closed
        }
    }

    fn test_session() -> Session {
        Session::with_rng(MatchConfig::default(), StdRng::seed_from_u64(7))
    }

    fn connect(session: &mut Session, conn: ConnectionId) -> (TestClient, Result<u32, JoinError>) {
        let addr: SocketAddr = format!("127.0.0.1:{}", 9000 + conn).parse().unwrap();
        let (tx, rx) = mpsc::channel(1024);
        let result = session.join(ClientHandle::new(conn, addr, tx));
        (TestClient { conn, rx }, result)
    }

    fn lobby(count: u32) -> (Session, Vec<TestClient>) {
        let mut session = test_session();
        let clients = (1..=count)
            .map(|conn| {
                let (client, result) = connect(&mut session, conn);
                result.unwrap();
                client
            })
            .collect();
        (session, clients)
    }

    #[test]
    fn test_join_assigns_sequential_ids() {
        let mut session = test_session();

        let (mut first, id1) = connect(&mut session, 10);
        let (_second, id2) = connect(&mut session, 11);

        assert_eq!(id1, Ok(1));
        assert_eq!(id2, Ok(2));
        assert_eq!(session.len(), 2);
        assert_eq!(session.player_id_for(10), Some(1));

        let packets = first.drain();
        assert_eq!(packets[0], ServerPacket::Welcome { player_id: 1 });
        assert!(matches!(packets[1], ServerPacket::Settings { .. }));
        match packets.last() {
            Some(ServerPacket::PlayerList { players }) => {
                let ids: Vec<u32> = players.iter().map(|p| p.id).collect();
                assert_eq!(ids, vec![1, 2]);
                assert_eq!(players[1].color, "#4ECDC4");
            }
            other => panic!("Expected roster, got {:?}", other),
        }
    }

    #[test]
    fn test_join_rejected_when_full() {
        let (mut session, _clients) = lobby(4);

        let (mut fifth, result) = connect(&mut session, 5);

        assert_eq!(result, Err(JoinError::RoomFull));
        assert_eq!(session.len(), 4);
        assert_eq!(
            fifth.drain(),
            vec![ServerPacket::Error {
                msg: "Room is full".to_string()
            }]
        );
    }

    #[test]
    fn test_join_rejected_while_active() {
        let (mut session, _clients) = lobby(2);
        assert_ok!(session.start());

        let (mut late, result) = connect(&mut session, 3);

        assert_eq!(result, Err(JoinError::MatchInProgress));
        assert!(late.saw_close());
        assert_eq!(session.len(), 2);
    }

    #[test]
    fn test_start_requires_two_players() {
        let (mut session, _clients) = lobby(1);

        assert_eq!(session.start(), Err(SessionError::NotEnoughPlayers));
        assert_eq!(session.state(), SessionState::Waiting);
        assert!(!session.is_ticking());
    }

    #[test]
    fn test_start_resets_players_and_broadcasts() {
        let (mut session, mut clients) = lobby(2);
        session.player_mut(1).unwrap().shields = 0;
        clients[0].drain();

        assert_ok!(session.start());

        assert_eq!(session.state(), SessionState::Active);
        assert!(session.is_ticking());
        for player in session.players() {
            assert_eq!(player.x, 0.5);
            assert_eq!(player.shields, 1);
            assert_approx_eq!(player.speed, 0.35);
        }
        assert_eq!(clients[0].drain(), vec![ServerPacket::GameStart]);
        assert_eq!(session.start(), Err(SessionError::InvalidState(SessionState::Active)));
    }

    #[test]
    fn test_tick_broadcasts_full_snapshot() {
        let (mut session, mut clients) = lobby(3);
        assert_ok!(session.start());
        session.player_mut(3).unwrap().alive = false;
        clients[1].drain();

        session.tick(DT);

        let packets = clients[1].drain();
        match packets.last() {
            Some(ServerPacket::Update { state }) => {
                assert_eq!(state.len(), 3);
                assert!(!state[2].alive);
                assert!(state[0].alive);
            }
            other => panic!("Expected update, got {:?}", other),
        }
        assert_eq!(session.tick_count(), 1);
    }

    #[test]
    fn test_shield_break_event_then_death() {
        let (mut session, mut clients) = lobby(2);
        assert_ok!(session.start());
        {
            let player = session.player_mut(1).unwrap();
            player.direction = Direction::Right;
            player.x = 0.999;
        }
        clients[0].drain();

        session.tick(DT);

        let packets = clients[0].drain();
        assert_eq!(
            packets[0],
            ServerPacket::Event {
                payload: GameEvent::ShieldBreak { player_id: 1 }
            }
        );
        let player = session.player(1).unwrap();
        assert_approx_eq!(player.x, 0.98);
        assert_eq!(player.direction, Direction::Left);
        assert_eq!(session.state(), SessionState::Active);
    }

    #[test]
    fn test_last_survivor_wins() {
        let (mut session, mut clients) = lobby(2);
        assert_ok!(session.start());
        {
            let player = session.player_mut(2).unwrap();
            player.shields = 0;
            player.direction = Direction::Left;
            player.x = 0.001;
        }
        {
            let player = session.player_mut(1).unwrap();
            player.direction = Direction::Right;
            player.x = 0.5;
        }
        clients[0].drain();

        session.tick(DT);

        assert_eq!(session.state(), SessionState::Ended);
        assert_eq!(session.winner(), Some(1));
        assert!(!session.is_ticking());

        let packets = clients[0].drain();
        assert!(matches!(
            packets[0],
            ServerPacket::Event {
                payload: GameEvent::Death { player_id: 2, .. }
            }
        ));
        assert!(matches!(packets[1], ServerPacket::Update { .. }));
        assert_eq!(packets[2], ServerPacket::GameOver { winner_id: Some(1) });
        assert_eq!(packets.len(), 3);
    }

    #[test]
    fn test_simultaneous_deaths_draw() {
        let (mut session, mut clients) = lobby(2);
        assert_ok!(session.start());
        for id in [1, 2] {
            let player = session.player_mut(id).unwrap();
            player.shields = 0;
            player.direction = Direction::Right;
            player.x = 0.999;
        }
        clients[1].drain();

        session.tick(DT);

        assert_eq!(session.state(), SessionState::Ended);
        assert_eq!(session.winner(), None);
        assert_eq!(
            clients[1].drain().last(),
            Some(&ServerPacket::GameOver { winner_id: None })
        );
    }

    #[test]
    fn test_bounce_input_routed_to_pivot() {
        let (mut session, mut clients) = lobby(2);
        assert_ok!(session.start());
        {
            let player = session.player_mut(2).unwrap();
            player.direction = Direction::Right;
            player.x = 0.6;
        }
        clients[0].drain();

        session.handle_packet(clients[1].conn, ClientPacket::Input);

        let player = session.player(2).unwrap();
        assert_approx_eq!(player.max_x, 0.6);
        assert_eq!(player.direction, Direction::Left);
        let packets = clients[0].drain();
        assert!(matches!(
            packets.as_slice(),
            [ServerPacket::Event {
                payload: GameEvent::Bounce { player_id: 2, .. }
            }]
        ));
    }

    #[test]
    fn test_bounce_ignored_outside_active_match() {
        let (mut session, mut clients) = lobby(2);
        clients[0].drain();

        session.handle_packet(1, ClientPacket::Input);

        assert_eq!(session.player(1).unwrap().max_x, 1.0);
        assert!(clients[0].drain().is_empty());
    }

    #[test]
    fn test_bounce_ignored_for_dead_player() {
        let (mut session, _clients) = lobby(3);
        assert_ok!(session.start());
        session.player_mut(1).unwrap().alive = false;

        session.on_bounce(1);
        session.on_bounce(99);

        assert_eq!(session.player(1).unwrap().max_x, 1.0);
        assert_eq!(session.player(1).unwrap().min_x, 0.0);
    }

    #[test]
    fn test_input_burst_within_one_tick_eliminates() {
        let (mut session, mut clients) = lobby(2);
        assert_ok!(session.start());
        clients[0].drain();

        for _ in 0..200 {
            session.handle_packet(clients[1].conn, ClientPacket::Input);
            let player = session.player(2).unwrap();
            assert!(player.min_x < player.max_x);
            if !player.alive {
                break;
            }
        }

        assert!(!session.player(2).unwrap().alive);
        let packets = clients[0].drain();
        assert!(matches!(
            packets.last(),
            Some(ServerPacket::Event {
                payload: GameEvent::Death { player_id: 2, .. }
            })
        ));

        session.tick(DT);
        assert_eq!(session.state(), SessionState::Ended);
        assert_eq!(session.winner(), Some(1));
    }

    #[test]
    fn test_settings_only_change_while_waiting() {
        let (mut session, mut clients) = lobby(2);
        clients[0].drain();

        session.handle_packet(
            1,
            ClientPacket::SetDifficulty {
                difficulty: Difficulty::Hard,
            },
        );
        session.handle_packet(2, ClientPacket::ToggleSpeedRamp { enabled: true });

        assert_eq!(session.config().difficulty, Difficulty::Hard);
        assert!(session.config().speed_ramp);
        assert_eq!(
            clients[0].drain().last(),
            Some(&ServerPacket::Settings {
                difficulty: Difficulty::Hard,
                speed_ramp: true
            })
        );

        assert_ok!(session.start());
        assert_approx_eq!(session.player(1).unwrap().speed, 0.55);
        assert_eq!(
            session.set_difficulty(Difficulty::Easy),
            Err(SessionError::InvalidState(SessionState::Active))
        );
        assert_err!(session.set_speed_ramp(false));
        assert_eq!(session.config().difficulty, Difficulty::Hard);
    }

    #[test]
    fn test_rematch_only_after_end() {
        let (mut session, mut clients) = lobby(2);
        assert_err!(session.rematch());

        assert_ok!(session.start());
        assert_err!(session.rematch());

        session.player_mut(1).unwrap().alive = false;
        session.tick(DT);
        assert_eq!(session.state(), SessionState::Ended);
        clients[0].drain();

        session.handle_packet(2, ClientPacket::Rematch);

        assert_eq!(session.state(), SessionState::Active);
        assert!(session.is_ticking());
        assert_eq!(session.winner(), None);
        assert!(session.players().all(|p| p.alive && p.x == 0.5));
        assert_eq!(clients[0].drain(), vec![ServerPacket::GameStart]);
    }

    #[test]
    fn test_leave_mid_match_aborts() {
        let (mut session, mut clients) = lobby(2);
        assert_ok!(session.start());
        clients[0].drain();

        assert!(session.leave(2));

        assert_eq!(session.state(), SessionState::Waiting);
        assert!(!session.is_ticking());
        assert_eq!(session.winner(), None);
        let packets = clients[0].drain();
        assert!(matches!(packets[0], ServerPacket::MatchAborted { .. }));
        assert!(matches!(packets[1], ServerPacket::PlayerList { .. }));
    }

    #[test]
    fn test_leave_with_enough_players_continues() {
        let (mut session, _clients) = lobby(3);
        assert_ok!(session.start());

        session.leave(3);

        assert_eq!(session.state(), SessionState::Active);
        assert!(session.is_ticking());
        assert_eq!(session.len(), 2);
    }

    #[test]
    fn test_leave_unknown_connection() {
        let (mut session, _clients) = lobby(2);
        assert!(!session.leave(42));
        assert_eq!(session.len(), 2);
    }

    #[test]
    fn test_last_leave_resets_room() {
        let (mut session, _clients) = lobby(2);
        session.leave(1);
        session.leave(2);

        assert!(session.is_empty());
        let (_client, result) = connect(&mut session, 3);
        assert_eq!(result, Ok(1));
    }

    #[test]
    fn test_reset_round_trip_matches_fresh_session() {
        let (mut session, _clients) = lobby(2);
        assert_ok!(session.start());
        session.tick(DT);

        session.reset();
        assert_eq!(session.state(), SessionState::Waiting);
        assert!(session.is_empty());

        let (_a, id1) = connect(&mut session, 20);
        let (_b, id2) = connect(&mut session, 21);
        let (fresh, _fresh_clients) = lobby(2);

        assert_eq!((id1, id2), (Ok(1), Ok(2)));
        let reset_players: Vec<&Player> = session.players().collect();
        let fresh_players: Vec<&Player> = fresh.players().collect();
        assert_eq!(reset_players, fresh_players);
    }

    #[test]
    fn test_stop_game_idempotent() {
        let (mut session, _clients) = lobby(2);
        assert_ok!(session.start());

        session.stop_game();
        let state = session.state();
        let ticking = session.is_ticking();
        session.stop_game();

        assert_eq!(session.state(), state);
        assert_eq!(session.is_ticking(), ticking);
        assert_eq!(session.state(), SessionState::Ended);
        assert!(!session.is_ticking());
    }

    #[test]
    fn test_on_tick_clamps_stall() {
        let (mut session, _clients) = lobby(2);
        assert_ok!(session.start());
        for id in [1, 2] {
            let player = session.player_mut(id).unwrap();
            player.direction = Direction::Right;
        }

        session.on_tick(Instant::now() + Duration::from_secs(5));

        // A 5s stall advances by at most the delta cap
        for player in session.players() {
            assert!(player.x <= 0.5 + 0.35 * shared::MAX_DELTA_SECONDS + 1e-9);
            assert!(player.alive);
        }
    }

    #[test]
    fn test_on_tick_without_running_loop_is_noop() {
        let (mut session, _clients) = lobby(2);
        session.on_tick(Instant::now());
        assert_eq!(session.tick_count(), 0);
    }

    #[test]
    fn test_unknown_connection_commands_ignored() {
        let (mut session, _clients) = lobby(2);
        session.handle_packet(99, ClientPacket::Start);
        assert_eq!(session.state(), SessionState::Waiting);
    }

    #[test]
    fn test_failed_client_does_not_block_broadcast() {
        let (mut session, mut clients) = lobby(2);
        let dropped = clients.remove(0);
        drop(dropped);

        assert_ok!(session.start());
        session.tick(DT);

        let packets = clients[0].drain();
        assert!(packets.contains(&ServerPacket::GameStart));
        assert!(packets.iter().any(|p| matches!(p, ServerPacket::Update { .. })));
    }
}
