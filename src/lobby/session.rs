//! One lobby: seats, invites, the ready handshake, and its single match

use serde::Serialize;
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::info;
use uuid::Uuid;

use crate::game::{GameConfig, GameMatch, MatchHandle, MAX_SEATS};
use crate::store::MatchRecorder;
use crate::ws::hub::{PlayerHandle, Recipients};
use crate::ws::protocol::{PlayerInfo, ServerMsg, SessionMode};

use super::error::LobbyError;

/// Lobby lifecycle as seen from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Empty,
    /// One seat taken
    Filling,
    /// Both seats taken, not both ready
    FullPending,
    /// Both ready, pre-match countdown running
    Starting,
    Active,
    /// Match finished or stopped; the lobby never hosts a second match
    Terminated,
}

#[derive(Debug, Clone)]
struct Seat {
    player: PlayerHandle,
    ready: bool,
}

/// Read-only view for tests
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: Uuid,
    pub mode: SessionMode,
    pub players: Vec<PlayerInfo>,
    pub invited: Vec<Uuid>,
    pub status: SessionStatus,
}

pub struct Session {
    pub id: Uuid,
    pub mode: SessionMode,
    pub created_at: Instant,
    /// Insertion order decides player1/player2
    seats: Vec<Seat>,
    invited: Vec<Uuid>,
    recipients: Recipients,
    engine: Option<MatchHandle>,
    terminated: bool,
    game_config: GameConfig,
    recorder: Arc<dyn MatchRecorder>,
}

impl Session {
    pub fn new(
        mode: SessionMode,
        game_config: GameConfig,
        recorder: Arc<dyn MatchRecorder>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            created_at: Instant::now(),
            seats: Vec::with_capacity(MAX_SEATS),
            invited: Vec::new(),
            recipients: Recipients::new(),
            engine: None,
            terminated: false,
            game_config,
            recorder,
        }
    }

    pub fn player_count(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.seats.len() >= MAX_SEATS
    }

    pub fn contains(&self, conn_id: Uuid) -> bool {
        self.seats.iter().any(|s| s.player.conn_id == conn_id)
    }

    /// Seated connection belonging to a user, if any
    pub fn seated_user(&self, user_id: Uuid) -> Option<&PlayerHandle> {
        self.seats
            .iter()
            .map(|s| &s.player)
            .find(|p| p.user_id == user_id)
    }

    pub fn conn_ids(&self) -> Vec<Uuid> {
        self.seats.iter().map(|s| s.player.conn_id).collect()
    }

    pub fn players(&self) -> Vec<PlayerInfo> {
        self.seats.iter().map(|s| s.player.info()).collect()
    }

    pub fn is_invited(&self, user_id: Uuid) -> bool {
        self.invited.contains(&user_id)
    }

    pub fn invite(&mut self, user_id: Uuid) {
        if !self.is_invited(user_id) {
            self.invited.push(user_id);
        }
    }

    pub fn engine(&self) -> Option<&MatchHandle> {
        self.engine.as_ref()
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    pub fn status(&self) -> SessionStatus {
        if self.terminated {
            return SessionStatus::Terminated;
        }
        match &self.engine {
            Some(engine) if engine.is_done() => SessionStatus::Terminated,
            Some(engine) if engine.in_play() => SessionStatus::Active,
            Some(_) => SessionStatus::Starting,
            None => match self.seats.len() {
                0 => SessionStatus::Empty,
                1 => SessionStatus::Filling,
                _ => SessionStatus::FullPending,
            },
        }
    }

    #[cfg(test)]
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            mode: self.mode,
            players: self.players(),
            invited: self.invited.clone(),
            status: self.status(),
        }
    }

    /// Seat a player. A full second seat makes the lobby eligible to start,
    /// but only the ready handshake starts the match.
    pub fn add_player(&mut self, player: PlayerHandle) -> Result<(), LobbyError> {
        if self.contains(player.conn_id) {
            return Err(LobbyError::AlreadyInThisSession);
        }
        if self.is_full() {
            return Err(LobbyError::SessionFull);
        }

        info!(
            session_id = %self.id,
            user_id = %player.user_id,
            seats = self.seats.len() + 1,
            "Player seated"
        );
        self.recipients.add(player.clone());
        self.seats.push(Seat { player, ready: false });
        Ok(())
    }

    /// Unseat a player. Never stops the match; the registry decides that.
    pub fn remove_player(&mut self, conn_id: Uuid) -> Option<PlayerHandle> {
        let pos = self.seats.iter().position(|s| s.player.conn_id == conn_id)?;
        self.recipients.remove(conn_id);
        Some(self.seats.remove(pos).player)
    }

    /// Record readiness; starts the match the first time both seats are
    /// filled and ready. Returns true if this call started it.
    pub fn set_player_ready(&mut self, conn_id: Uuid, ready: bool) -> Result<bool, LobbyError> {
        let seat = self
            .seats
            .iter_mut()
            .find(|s| s.player.conn_id == conn_id)
            .ok_or(LobbyError::NotInSession)?;
        seat.ready = ready;

        let all_ready = self.is_full() && self.seats.iter().all(|s| s.ready);
        if !all_ready || self.engine.is_some() || self.terminated {
            return Ok(false);
        }

        self.start_match();
        Ok(true)
    }

    fn start_match(&mut self) {
        let players = [self.seats[0].player.clone(), self.seats[1].player.clone()];
        let (game_match, handle) = GameMatch::new(
            self.id,
            self.mode,
            players,
            self.recipients.clone(),
            self.game_config.clone(),
            rand::random::<u64>(),
            self.recorder.clone(),
        );

        info!(session_id = %self.id, "Both players ready, starting match");
        self.engine = Some(handle);
        tokio::spawn(game_match.run());
    }

    /// Send to every seated player
    pub fn broadcast(&self, msg: ServerMsg) {
        self.recipients.send(&msg);
    }

    /// Forced stop of the owned match; the lobby is finished after this
    pub fn stop(&mut self) {
        self.terminated = true;
        if let Some(engine) = &self.engine {
            info!(session_id = %engine.session_id, "Stopping match");
            engine.stop();
        }
    }
}
