//! Match task: countdowns and the fixed-timestep loop around `MatchState`

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::store::{MatchRecord, MatchRecorder};
use crate::ws::hub::{PlayerHandle, Recipients};
use crate::ws::protocol::{ServerMsg, SessionMode};

use super::config::GameConfig;
use super::physics::Direction;
use super::snapshot::{score_msg, start_msg, state_msg};
use super::state::{EngineError, MatchState, StepOutcome};

/// Input forwarded into a running match
#[derive(Debug, Clone)]
pub struct EngineInput {
    pub conn_id: Uuid,
    pub direction: Direction,
}

/// How a match task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchEnd {
    Completed { winner: Uuid, scores: [u32; 2] },
    Aborted { scores: [u32; 2] },
}

/// Why a rally loop returned
enum RallyEnd {
    Point,
    Finished(usize),
    Stopped,
    Failed(EngineError),
}

/// Handle to a running match, held by its session
#[derive(Clone)]
pub struct MatchHandle {
    pub session_id: Uuid,
    players: [Uuid; 2],
    input_tx: mpsc::UnboundedSender<EngineInput>,
    stop_tx: Arc<watch::Sender<bool>>,
    in_play: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
}

impl MatchHandle {
    /// Queue a paddle intent; applied before the next step
    pub fn set_paddle_direction(
        &self,
        conn_id: Uuid,
        direction: Direction,
    ) -> Result<(), EngineError> {
        if !self.players.contains(&conn_id) {
            return Err(EngineError::UnknownPlayer(conn_id));
        }
        self.input_tx
            .send(EngineInput { conn_id, direction })
            .map_err(|_| EngineError::NotRunning)
    }

    /// Request a forced stop. Observed on the next countdown or loop tick.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Past the pre-match countdown
    pub fn in_play(&self) -> bool {
        self.in_play.load(Ordering::Acquire)
    }

    /// The task has returned
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

/// The authoritative match task for one session
pub struct GameMatch {
    session_id: Uuid,
    mode: SessionMode,
    state: MatchState,
    players: [PlayerHandle; 2],
    recipients: Recipients,
    input_rx: mpsc::UnboundedReceiver<EngineInput>,
    stop_rx: watch::Receiver<bool>,
    recorder: Arc<dyn MatchRecorder>,
    in_play: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
}

impl GameMatch {
    pub fn new(
        session_id: Uuid,
        mode: SessionMode,
        players: [PlayerHandle; 2],
        recipients: Recipients,
        config: GameConfig,
        seed: u64,
        recorder: Arc<dyn MatchRecorder>,
    ) -> (Self, MatchHandle) {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        let in_play = Arc::new(AtomicBool::new(false));
        let done = Arc::new(AtomicBool::new(false));
        let conn_ids = [players[0].conn_id, players[1].conn_id];

        let handle = MatchHandle {
            session_id,
            players: conn_ids,
            input_tx,
            stop_tx: Arc::new(stop_tx),
            in_play: in_play.clone(),
            done: done.clone(),
        };

        let game_match = Self {
            session_id,
            mode,
            state: MatchState::new(conn_ids, config, seed),
            players,
            recipients,
            input_rx,
            stop_rx,
            recorder,
            in_play,
            done,
        };

        (game_match, handle)
    }

    /// Run the match to completion or until stopped
    pub async fn run(mut self) -> MatchEnd {
        info!(session_id = %self.session_id, "Match starting");

        let end = self.play().await;
        self.done.store(true, Ordering::Release);

        match &end {
            MatchEnd::Completed { winner, scores } => info!(
                session_id = %self.session_id,
                winner = %winner,
                score = ?scores,
                "Match finished"
            ),
            MatchEnd::Aborted { scores } => info!(
                session_id = %self.session_id,
                score = ?scores,
                "Match aborted"
            ),
        }
        end
    }

    async fn play(&mut self) -> MatchEnd {
        self.state.start();
        let user_ids = [self.players[0].user_id, self.players[1].user_id];
        self.recipients.send(&start_msg(&self.state, user_ids));

        let start_secs = self.state.config.start_countdown_secs;
        if !self.countdown(start_secs).await {
            return self.abort();
        }
        self.in_play.store(true, Ordering::Release);

        let point_secs = self.state.config.point_countdown_secs;
        loop {
            self.state.resume();
            match self.rally().await {
                RallyEnd::Point => {
                    if !self.countdown(point_secs).await {
                        return self.abort();
                    }
                }
                RallyEnd::Finished(winner) => return self.finish(winner).await,
                RallyEnd::Stopped => return self.abort(),
                RallyEnd::Failed(e) => {
                    error!(session_id = %self.session_id, error = %e, "Match engine failure");
                    return self.abort();
                }
            }
        }
    }

    fn stop_requested(&self) -> bool {
        // A dropped handle means the owning session is gone
        *self.stop_rx.borrow() || self.stop_rx.has_changed().is_err()
    }

    /// Apply queued paddle intents
    fn process_inputs(&mut self) -> Result<(), EngineError> {
        while let Ok(input) = self.input_rx.try_recv() {
            self.state.set_direction(input.conn_id, input.direction)?;
        }
        Ok(())
    }

    /// Tick once per second down to zero. Returns false if stopped.
    async fn countdown(&mut self, seconds: u32) -> bool {
        for remaining in (0..=seconds).rev() {
            if self.stop_requested() {
                return false;
            }
            self.recipients.send(&ServerMsg::Countdown { seconds: remaining });

            if remaining > 0 {
                tokio::select! {
                    _ = sleep(Duration::from_secs(1)) => {}
                    _ = self.stop_rx.changed() => return false,
                }
            }

            if let Err(e) = self.process_inputs() {
                warn!(session_id = %self.session_id, error = %e, "Rejected input during countdown");
                return false;
            }
        }
        !self.stop_requested()
    }

    /// Fixed-timestep loop until a point, the finish, or a stop
    async fn rally(&mut self) -> RallyEnd {
        let timestep = self.state.config.timestep;
        let mut ticker = interval(timestep);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last = Instant::now();
        let mut accumulator = Duration::ZERO;

        loop {
            ticker.tick().await;

            if self.stop_requested() {
                return RallyEnd::Stopped;
            }
            if let Err(e) = self.process_inputs() {
                return RallyEnd::Failed(e);
            }

            let now = Instant::now();
            accumulator += now - last;
            last = now;

            while accumulator >= timestep {
                accumulator -= timestep;

                match self.state.step() {
                    StepOutcome::Continue => {
                        self.recipients.send(&state_msg(&self.state));
                    }
                    StepOutcome::Point { scorer } => {
                        info!(
                            session_id = %self.session_id,
                            scorer = %self.players[scorer].user_id,
                            score = ?self.state.scores,
                            "Point scored"
                        );
                        self.recipients.send(&score_msg(&self.state));
                        self.recipients.send(&state_msg(&self.state));
                        return RallyEnd::Point;
                    }
                    StepOutcome::Finished { winner } => {
                        self.recipients.send(&score_msg(&self.state));
                        return RallyEnd::Finished(winner);
                    }
                }
            }
        }
    }

    /// Announce the winner, then persist. The event never waits on storage.
    async fn finish(&mut self, winner: usize) -> MatchEnd {
        let loser = 1 - winner;
        let scores = self.state.scores;

        self.recipients.send(&ServerMsg::Finish {
            winner: Some(self.players[winner].info()),
            player1_score: scores[0],
            player2_score: scores[1],
        });

        let record = MatchRecord {
            player1_id: self.players[0].user_id,
            player2_id: self.players[1].user_id,
            player1_score: scores[0],
            player2_score: scores[1],
            winner_id: Some(self.players[winner].user_id),
            loser_id: Some(self.players[loser].user_id),
            mode: self.mode,
        };

        if let Err(e) = self.recorder.record_match(record).await {
            error!(session_id = %self.session_id, error = %e, "Failed to store match record");
        }

        MatchEnd::Completed {
            winner: self.players[winner].user_id,
            scores,
        }
    }

    /// Forced stop: no record, a final winnerless `finish`
    fn abort(&mut self) -> MatchEnd {
        let scores = self.state.scores;
        self.recipients.send(&ServerMsg::Finish {
            winner: None,
            player1_score: scores[0],
            player2_score: scores[1],
        });
        MatchEnd::Aborted { scores }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryMatchStore;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Fixture {
        handle: MatchHandle,
        task: tokio::task::JoinHandle<MatchEnd>,
        players: [PlayerHandle; 2],
        rx: UnboundedReceiver<ServerMsg>,
        store: Arc<MemoryMatchStore>,
    }

    /// Fast paddles so a held `Up` pins them to the top before any ball arrives
    fn test_config() -> GameConfig {
        GameConfig {
            paddle_speed: 40_000.0,
            max_score: 3,
            ..GameConfig::default()
        }
    }

    fn spawn_match(config: GameConfig, store: Arc<MemoryMatchStore>) -> Fixture {
        let (p1, rx) = PlayerHandle::new(Uuid::new_v4(), "ann".to_string());
        let (p2, _rx2) = PlayerHandle::new(Uuid::new_v4(), "bob".to_string());
        let recipients = Recipients::new();
        recipients.add(p1.clone());

        let (game_match, handle) = GameMatch::new(
            Uuid::new_v4(),
            SessionMode::Custom,
            [p1.clone(), p2.clone()],
            recipients,
            config,
            5,
            store.clone(),
        );
        let task = tokio::spawn(game_match.run());
        Fixture { handle, task, players: [p1, p2], rx, store }
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_match_emits_ordered_events_and_records_result() {
        let store = Arc::new(MemoryMatchStore::default());
        let mut f = spawn_match(test_config(), store);
        for player in &f.players {
            f.handle.set_paddle_direction(player.conn_id, Direction::Up).unwrap();
        }

        let end = f.task.await.unwrap();
        assert_eq!(
            end,
            MatchEnd::Completed { winner: f.players[1].user_id, scores: [2, 3] }
        );

        let mut events = Vec::new();
        while let Ok(msg) = f.rx.try_recv() {
            events.push(msg);
        }

        assert!(matches!(events.first(), Some(ServerMsg::Start { .. })));
        assert!(matches!(events.last(), Some(ServerMsg::Finish { winner: Some(_), .. })));

        // Every point: score, then the post-reset state
        for pair in events.windows(2) {
            if let ServerMsg::Score { .. } = pair[0] {
                assert!(matches!(pair[1], ServerMsg::State { .. } | ServerMsg::Finish { .. }));
            }
        }

        let first_score = events.iter().find_map(|m| match m {
            ServerMsg::Score {
                player1_score,
                player2_score,
            } => Some((*player1_score, *player2_score)),
            _ => None,
        });
        assert_eq!(first_score, Some((0, 1)));

        let records = f.store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].winner_id, Some(f.players[1].user_id));
        assert_eq!(records[0].loser_id, Some(f.players[0].user_id));
        assert_eq!((records[0].player1_score, records[0].player2_score), (2, 3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_countdown_aborts_without_state_or_record() {
        let store = Arc::new(MemoryMatchStore::default());
        let mut f = spawn_match(test_config(), store);

        // Start + first countdown tick
        assert!(matches!(f.rx.recv().await, Some(ServerMsg::Start { .. })));
        assert!(matches!(f.rx.recv().await, Some(ServerMsg::Countdown { seconds: 3 })));

        f.handle.stop();
        let end = f.task.await.unwrap();
        assert_eq!(end, MatchEnd::Aborted { scores: [0, 0] });
        assert!(f.handle.is_done());
        assert!(!f.handle.in_play());

        let rest: Vec<ServerMsg> = std::iter::from_fn(|| f.rx.try_recv().ok()).collect();
        assert!(rest.iter().all(|m| !matches!(m, ServerMsg::State { .. })));
        assert!(matches!(rest.last(), Some(ServerMsg::Finish { winner: None, .. })));
        assert!(f.store.records().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_failure_still_announces_winner() {
        let store = Arc::new(MemoryMatchStore::failing());
        let mut f = spawn_match(test_config(), store);
        for player in &f.players {
            f.handle.set_paddle_direction(player.conn_id, Direction::Up).unwrap();
        }

        assert!(matches!(f.task.await.unwrap(), MatchEnd::Completed { .. }));
        let last = std::iter::from_fn(|| f.rx.try_recv().ok()).last();
        assert!(matches!(last, Some(ServerMsg::Finish { winner: Some(_), .. })));
    }

    #[tokio::test]
    async fn test_direction_from_stranger_is_rejected() {
        let store = Arc::new(MemoryMatchStore::default());
        let f = spawn_match(test_config(), store);
        let stranger = Uuid::new_v4();
        assert_eq!(
            f.handle.set_paddle_direction(stranger, Direction::Down),
            Err(EngineError::UnknownPlayer(stranger))
        );
        f.handle.stop();
    }
}
