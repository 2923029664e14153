//! Live sessions, the matchmaking queue, and stale-session expiry

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::{Direction, GameConfig};
use crate::matchmaking::{MatchmakingQueue, QueuedPlayer};
use crate::store::{BlockList, MatchRecorder};
use crate::ws::hub::{ConnectionHub, PlayerHandle};
use crate::ws::protocol::{PlayerInfo, ServerMsg, SessionMode};

use super::error::LobbyError;
#[cfg(test)]
use super::session::SessionInfo;
use super::session::{Session, SessionStatus};

type SharedSession = Arc<Mutex<Session>>;

/// Lifetime limits enforced by the sweep
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub max_session_lifetime: Duration,
    pub sweep_interval: Duration,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            max_session_lifetime: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(5),
        }
    }
}

/// Single authority over which connection sits in which session.
///
/// Each session sits behind its own mutex so unrelated lobbies never
/// contend. Never hold a session lock while touching `sessions`.
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SharedSession>,
    queue: Mutex<MatchmakingQueue>,
    /// conn_id -> session_id; at most one seat per connection
    player_sessions: DashMap<Uuid, Uuid>,
    hub: Arc<ConnectionHub>,
    block_list: Arc<dyn BlockList>,
    recorder: Arc<dyn MatchRecorder>,
    game_config: GameConfig,
    settings: RegistrySettings,
}

impl SessionRegistry {
    pub fn new(
        hub: Arc<ConnectionHub>,
        block_list: Arc<dyn BlockList>,
        recorder: Arc<dyn MatchRecorder>,
        game_config: GameConfig,
        settings: RegistrySettings,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            queue: Mutex::new(MatchmakingQueue::default()),
            player_sessions: DashMap::new(),
            hub,
            block_list,
            recorder,
            game_config,
            settings,
        }
    }

    fn new_session(&self, mode: SessionMode) -> Session {
        Session::new(mode, self.game_config.clone(), self.recorder.clone())
    }

    fn session(&self, id: &Uuid) -> Option<SharedSession> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Clone out every live session so no map guard is held while locking one
    fn live_sessions(&self) -> Vec<(Uuid, SharedSession)> {
        self.sessions
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Session a connection is seated in
    pub fn session_of(&self, conn_id: &Uuid) -> Option<Uuid> {
        self.player_sessions.get(conn_id).map(|r| *r)
    }

    fn current_session(&self, conn_id: &Uuid) -> Result<(Uuid, SharedSession), LobbyError> {
        let id = self.session_of(conn_id).ok_or(LobbyError::NotInSession)?;
        let session = self.session(&id).ok_or(LobbyError::NotInSession)?;
        Ok((id, session))
    }

    /// Atomically bind a connection to a session
    fn claim_seat(&self, conn_id: Uuid, session_id: Uuid) -> Result<(), LobbyError> {
        match self.player_sessions.entry(conn_id) {
            Entry::Occupied(_) => Err(LobbyError::AlreadyInSession),
            Entry::Vacant(slot) => {
                slot.insert(session_id);
                Ok(())
            }
        }
    }

    fn release_seat(&self, conn_id: &Uuid, session_id: Uuid) {
        self.player_sessions.remove_if(conn_id, |_, id| *id == session_id);
    }

    fn joined_msg(session: &Session) -> ServerMsg {
        ServerMsg::SessionJoined {
            session_id: session.id,
            mode: session.mode,
            players: session.players(),
        }
    }

    /// Open a custom lobby with the caller in the first seat
    pub fn create_custom_session(&self, player: &PlayerHandle) -> Result<Uuid, LobbyError> {
        if self.player_sessions.contains_key(&player.conn_id) {
            return Err(LobbyError::AlreadyInSession);
        }

        let mut session = self.new_session(SessionMode::Custom);
        let session_id = session.id;
        session.add_player(player.clone())?;
        let joined = Self::joined_msg(&session);

        // Registered before the seat is claimed: a claimed seat always
        // resolves to a live session
        {
            let queue = self.queue.lock();
            if queue.contains(&player.conn_id) {
                return Err(LobbyError::AlreadyQueued);
            }
            self.sessions.insert(session_id, Arc::new(Mutex::new(session)));
            if let Err(e) = self.claim_seat(player.conn_id, session_id) {
                self.sessions.remove(&session_id);
                return Err(e);
            }
        }

        player.send(joined);

        info!(session_id = %session_id, user_id = %player.user_id, "Custom session created");
        Ok(session_id)
    }

    /// Take a seat in an existing lobby
    pub fn join_session(&self, player: &PlayerHandle, session_id: Uuid) -> Result<(), LobbyError> {
        match self.session_of(&player.conn_id) {
            Some(current) if current == session_id => return Err(LobbyError::AlreadyInThisSession),
            Some(_) => return Err(LobbyError::AlreadyInSession),
            None => {}
        }
        if self.is_queued(&player.conn_id) {
            return Err(LobbyError::AlreadyQueued);
        }

        let shared = self.session(&session_id).ok_or(LobbyError::SessionNotFound)?;
        let mut session = shared.lock();

        if session.status() == SessionStatus::Terminated {
            return Err(LobbyError::SessionNotFound);
        }
        if session.mode == SessionMode::Custom && !session.is_invited(player.user_id) {
            return Err(LobbyError::NotInvited);
        }
        if session.is_full() {
            return Err(LobbyError::SessionFull);
        }
        if session.contains(player.conn_id) {
            return Err(LobbyError::AlreadyInThisSession);
        }

        self.claim_seat(player.conn_id, session_id)?;
        if let Err(e) = session.add_player(player.clone()) {
            self.release_seat(&player.conn_id, session_id);
            return Err(e);
        }
        session.broadcast(Self::joined_msg(&session));

        info!(session_id = %session_id, user_id = %player.user_id, "Player joined session");
        Ok(())
    }

    /// Invite a user into the inviter's current lobby
    pub async fn invite_to_session(
        &self,
        inviter: &PlayerHandle,
        target_user_id: Uuid,
    ) -> Result<(), LobbyError> {
        if inviter.user_id == target_user_id {
            return Err(LobbyError::SelfInvite);
        }
        let (session_id, shared) = self
            .current_session(&inviter.conn_id)
            .map_err(|_| LobbyError::InviterNotSeated)?;
        self.invite_into(session_id, shared, inviter.info(), target_user_id)
            .await
    }

    /// Invite issued outside a lobby context (chat command). The inviter's
    /// lobby is found by scanning seated connections for their user id.
    pub async fn invite_from_chat(
        &self,
        user_id: Uuid,
        target_user_id: Uuid,
    ) -> Result<Uuid, LobbyError> {
        if user_id == target_user_id {
            return Err(LobbyError::SelfInvite);
        }

        let found = self.live_sessions().into_iter().find_map(|(id, shared)| {
            let inviter = shared.lock().seated_user(user_id).map(PlayerHandle::info);
            inviter.map(|info| (id, shared, info))
        });
        let (session_id, shared, inviter) = found.ok_or(LobbyError::InviterNotSeated)?;

        self.invite_into(session_id, shared, inviter, target_user_id)
            .await?;
        Ok(session_id)
    }

    fn check_invitable(&self, session: &Session, target_user_id: Uuid) -> Result<(), LobbyError> {
        if session.is_full() {
            return Err(LobbyError::SessionFull);
        }
        let target_seated = self
            .hub
            .connections_of(target_user_id)
            .iter()
            .any(|conn| self.player_sessions.contains_key(&conn.conn_id))
            || session.seated_user(target_user_id).is_some();
        if target_seated {
            return Err(LobbyError::TargetInSession);
        }
        if session.is_invited(target_user_id) {
            return Err(LobbyError::AlreadyInvited);
        }
        Ok(())
    }

    async fn invite_into(
        &self,
        session_id: Uuid,
        shared: SharedSession,
        inviter: PlayerInfo,
        target_user_id: Uuid,
    ) -> Result<(), LobbyError> {
        {
            let session = shared.lock();
            self.check_invitable(&session, target_user_id)?;
        }

        let blocked = self
            .block_list
            .has_blocked(target_user_id, inviter.user_id)
            .await
            .map_err(|e| LobbyError::Store(e.to_string()))?;
        if blocked {
            return Err(LobbyError::Blocked);
        }

        {
            // Re-check: the lobby may have changed during the lookup
            let mut session = shared.lock();
            if session.status() == SessionStatus::Terminated {
                return Err(LobbyError::InviterNotSeated);
            }
            self.check_invitable(&session, target_user_id)?;
            session.invite(target_user_id);
        }

        let reached = self.hub.send_to_user(
            target_user_id,
            &ServerMsg::Invite {
                session_id,
                from: inviter.clone(),
            },
        );
        info!(
            session_id = %session_id,
            inviter = %inviter.user_id,
            target = %target_user_id,
            connections = reached,
            "Invite sent"
        );
        Ok(())
    }

    /// Ready handshake for the caller's lobby
    pub fn set_ready(&self, player: &PlayerHandle, ready: bool) -> Result<(), LobbyError> {
        let (_, shared) = self.current_session(&player.conn_id)?;
        shared.lock().set_player_ready(player.conn_id, ready)?;
        Ok(())
    }

    /// Forward a paddle intent to the caller's running match
    pub fn move_paddle(
        &self,
        player: &PlayerHandle,
        direction: Direction,
    ) -> Result<(), LobbyError> {
        let (_, shared) = self.current_session(&player.conn_id)?;
        let session = shared.lock();
        let engine = session.engine().ok_or(LobbyError::MatchNotRunning)?;
        engine.set_paddle_direction(player.conn_id, direction)?;
        Ok(())
    }

    /// Enter the matchmaking queue; fills a new session as soon as two wait
    pub fn enqueue(&self, player: &PlayerHandle) -> Result<(), LobbyError> {
        if self.player_sessions.contains_key(&player.conn_id) {
            return Err(LobbyError::AlreadyInSession);
        }

        let mut queue = self.queue.lock();
        if !queue.enqueue(QueuedPlayer::new(player.clone())) {
            return Err(LobbyError::AlreadyQueued);
        }
        info!(
            user_id = %player.user_id,
            queue_size = queue.len(),
            "Player joined matchmaking queue"
        );

        let Some(drained) = queue.try_form_match() else {
            return Ok(());
        };

        let mut session = self.new_session(SessionMode::Queued);
        let session_id = session.id;
        for queued in &drained {
            if let Err(e) = session.add_player(queued.handle.clone()) {
                warn!(user_id = %queued.handle.user_id, error = %e, "Could not seat queued player");
            }
        }

        // The session is registered and locked before any seat is claimed, and
        // all of it happens under the queue lock, so a drained player is never
        // observed as neither queued nor seated, and a claimed seat always
        // resolves to a live session
        let shared = Arc::new(Mutex::new(session));
        self.sessions.insert(session_id, shared.clone());
        let mut session = shared.lock();
        for queued in drained {
            let waited_ms = queued.wait_time().as_millis() as u64;
            let handle = queued.handle;
            if !session.contains(handle.conn_id) {
                continue;
            }
            if let Err(e) = self.claim_seat(handle.conn_id, session_id) {
                session.remove_player(handle.conn_id);
                warn!(
                    user_id = %handle.user_id,
                    error = %e,
                    "Dropped queued player already seated"
                );
                continue;
            }
            debug!(user_id = %handle.user_id, waited_ms, "Queued player matched");
        }
        drop(queue);

        if session.is_empty() {
            session.stop();
            drop(session);
            self.sessions.remove(&session_id);
            return Ok(());
        }

        session.broadcast(Self::joined_msg(&session));
        info!(
            session_id = %session_id,
            players = session.player_count(),
            "Matchmaking session created"
        );
        Ok(())
    }

    /// Leave the matchmaking queue
    pub fn dequeue(&self, player: &PlayerHandle) -> Result<(), LobbyError> {
        self.queue
            .lock()
            .dequeue(player.conn_id)
            .map(|_| ())
            .ok_or(LobbyError::NotQueued)
    }

    /// Leave the current lobby. Non-strict leaves are a no-op when not seated.
    pub fn leave(&self, player: &PlayerHandle, strict: bool) -> Result<(), LobbyError> {
        let Some(session_id) = self.session_of(&player.conn_id) else {
            return if strict { Err(LobbyError::NotInSession) } else { Ok(()) };
        };
        self.release_seat(&player.conn_id, session_id);

        let Some(shared) = self.session(&session_id) else {
            warn!(
                session_id = %session_id,
                user_id = %player.user_id,
                "Seat pointed at a session that is no longer registered"
            );
            return Ok(());
        };

        let now_empty = {
            let mut session = shared.lock();
            session.remove_player(player.conn_id);
            if session.is_empty() {
                session.stop();
                true
            } else {
                session.broadcast(ServerMsg::Message {
                    text: format!("{} left the lobby", player.display_name),
                });
                false
            }
        };

        if now_empty {
            self.sessions.remove(&session_id);
            info!(session_id = %session_id, "Last player left, session closed");
        } else {
            info!(session_id = %session_id, user_id = %player.user_id, "Player left session");
        }
        Ok(())
    }

    /// Connection closed: drop it from the queue and its lobby
    pub fn disconnect(&self, player: &PlayerHandle) {
        let _ = self.dequeue(player);
        let _ = self.leave(player, false);
    }

    /// Stop and remove every session older than the max lifetime.
    /// Returns how many were removed.
    pub fn expire_stale_sessions(&self) -> usize {
        let now = Instant::now();
        let mut expired = 0;

        for (session_id, shared) in self.live_sessions() {
            {
                let mut session = shared.lock();
                if session.age(now) <= self.settings.max_session_lifetime {
                    continue;
                }
                session.broadcast(ServerMsg::Message {
                    text: "Match timed out".to_string(),
                });
                session.stop();
                for conn_id in session.conn_ids() {
                    self.release_seat(&conn_id, session_id);
                }
            }

            self.sessions.remove(&session_id);
            expired += 1;
            info!(session_id = %session_id, "Session expired");
        }
        expired
    }

    /// Periodic expiry sweep
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.settings.sweep_interval);
        loop {
            interval.tick().await;
            self.expire_stale_sessions();
        }
    }

    /// Live sessions per lifecycle status
    pub fn status_counts(&self) -> BTreeMap<SessionStatus, usize> {
        let mut counts = BTreeMap::new();
        for (_, shared) in self.live_sessions() {
            let status = shared.lock().status();
            *counts.entry(status).or_insert(0) += 1;
        }
        counts
    }

    #[cfg(test)]
    pub fn session_info(&self, session_id: &Uuid) -> Option<SessionInfo> {
        self.session(session_id).map(|shared| shared.lock().info())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Longest current wait in the matchmaking queue
    pub fn oldest_queue_wait(&self) -> Option<Duration> {
        self.queue.lock().oldest_wait()
    }

    pub fn is_queued(&self, conn_id: &Uuid) -> bool {
        self.queue.lock().contains(conn_id)
    }

    /// Seated players across all sessions
    pub fn seated_count(&self) -> usize {
        self.player_sessions.len()
    }
}
