//! Authoritative match simulation: two paddles, one ball, two scores

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use super::config::GameConfig;
use super::physics::{circle_intersects_rect, hit_offset, Ball, Direction, Paddle};

/// Match phase. Exactly one holds at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Objects exist but the match was never started
    NotStarted,
    /// Pre-match countdown
    Countdown,
    /// Ball in play
    Running,
    /// Between points, countdown to the next serve
    Paused,
    /// Someone reached the max score
    Finished,
}

/// Result of one fixed step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    /// Seat index that scored; the ball was re-served
    Point { scorer: usize },
    /// Seat index that reached the max score
    Finished { winner: usize },
}

/// Engine-internal errors; fatal to the match that raised them only
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("Player {0} has no paddle in this match")]
    UnknownPlayer(Uuid),

    #[error("Match is not accepting input")]
    NotRunning,
}

/// Simulation state for a single match (owned by its match task)
pub struct MatchState {
    pub config: GameConfig,
    pub phase: MatchPhase,
    /// Connection ids by seat; seat 0 is player1 (left paddle)
    pub players: [Uuid; 2],
    pub paddles: [Paddle; 2],
    pub ball: Ball,
    pub scores: [u32; 2],
    /// Scalar ball speed, raised on every serve after the first
    pub ball_speed: f32,
    /// -1.0 serves toward player1, 1.0 toward player2
    next_serve_side: f32,
    serves: u32,
    rng: ChaCha8Rng,
}

impl MatchState {
    pub fn new(players: [Uuid; 2], config: GameConfig, seed: u64) -> Self {
        let left_x = config.paddle_margin;
        let right_x = config.field_width - config.paddle_margin - config.paddle_width;
        let ball = Ball {
            x: config.field_width / 2.0,
            y: config.field_height / 2.0,
            radius: config.ball_radius,
            vx: 0.0,
            vy: 0.0,
        };

        Self {
            phase: MatchPhase::NotStarted,
            players,
            paddles: [Paddle::new(left_x, &config), Paddle::new(right_x, &config)],
            ball,
            scores: [0, 0],
            ball_speed: config.ball_initial_speed,
            next_serve_side: -1.0,
            serves: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            config,
        }
    }

    /// Seat index of a connection
    pub fn seat_of(&self, conn_id: Uuid) -> Option<usize> {
        self.players.iter().position(|p| *p == conn_id)
    }

    /// Reset paddles and serve the ball from the centre.
    ///
    /// The serve angle is drawn from the configured cone around the
    /// horizontal, the serve side alternates on every call, and every call
    /// after the first raises the ball speed by the configured increment.
    pub fn initialize_objects(&mut self) {
        if self.serves > 0 {
            self.ball_speed += self.config.ball_speed_increment;
        }
        self.serves += 1;

        let center_y = (self.config.field_height - self.config.paddle_height) / 2.0;
        for paddle in self.paddles.iter_mut() {
            paddle.y = center_y;
            paddle.velocity = 0.0;
        }

        let half = self.config.launch_half_angle;
        let angle = self.rng.gen_range(-half..=half);
        let side = self.next_serve_side;
        self.next_serve_side = -side;

        self.ball.x = self.config.field_width / 2.0;
        self.ball.y = self.config.field_height / 2.0;
        self.ball.vx = side * angle.cos() * self.ball_speed;
        self.ball.vy = angle.sin() * self.ball_speed;
    }

    /// Zero the scores, serve, and enter the pre-match countdown
    pub fn start(&mut self) {
        self.scores = [0, 0];
        self.ball_speed = self.config.ball_initial_speed;
        self.serves = 0;
        self.next_serve_side = -1.0;
        self.initialize_objects();
        self.phase = MatchPhase::Countdown;
    }

    /// Countdown finished, ball in play
    pub fn resume(&mut self) {
        if matches!(self.phase, MatchPhase::Countdown | MatchPhase::Paused) {
            self.phase = MatchPhase::Running;
        }
    }

    pub fn set_direction(
        &mut self,
        conn_id: Uuid,
        direction: Direction,
    ) -> Result<(), EngineError> {
        let seat = self
            .seat_of(conn_id)
            .ok_or(EngineError::UnknownPlayer(conn_id))?;
        self.paddles[seat].direction = direction;
        Ok(())
    }

    /// Advance one fixed timestep. Only moves anything while running.
    pub fn step(&mut self) -> StepOutcome {
        if self.phase != MatchPhase::Running {
            return StepOutcome::Continue;
        }

        let dt = self.config.dt();
        let (min_y, max_y) = (self.config.paddle_min_y(), self.config.paddle_max_y());
        for paddle in self.paddles.iter_mut() {
            paddle.advance(dt, min_y, max_y);
        }

        self.ball.advance(dt);

        match self.resolve_collisions() {
            Some(scorer) => self.award_point(scorer),
            None => StepOutcome::Continue,
        }
    }

    /// Bounce off walls and paddles; returns the scoring seat if the ball
    /// crossed a goal line.
    fn resolve_collisions(&mut self) -> Option<usize> {
        let ball = &mut self.ball;
        let r = ball.radius;

        if ball.y - r <= 0.0 && ball.vy < 0.0 {
            ball.y = r;
            ball.vy = -ball.vy;
        } else if ball.y + r >= self.config.field_height && ball.vy > 0.0 {
            ball.y = self.config.field_height - r;
            ball.vy = -ball.vy;
        }

        // Only the paddle the ball is travelling toward can be hit
        let target = if ball.vx < 0.0 {
            Some(0)
        } else if ball.vx > 0.0 {
            Some(1)
        } else {
            None
        };

        if let Some(seat) = target {
            let paddle = &self.paddles[seat];
            if circle_intersects_rect(
                ball.x,
                ball.y,
                r,
                paddle.x,
                paddle.y,
                paddle.width,
                paddle.height,
            ) {
                let offset = hit_offset(ball, paddle);
                ball.vx = -ball.vx;
                ball.vy = offset * self.ball_speed;
            }
        }

        if ball.x <= r {
            Some(1)
        } else if ball.x >= self.config.field_width - r {
            Some(0)
        } else {
            None
        }
    }

    fn award_point(&mut self, scorer: usize) -> StepOutcome {
        self.scores[scorer] += 1;
        self.initialize_objects();

        if self.scores[scorer] >= self.config.max_score {
            self.phase = MatchPhase::Finished;
            StepOutcome::Finished { winner: scorer }
        } else {
            self.phase = MatchPhase::Paused;
            StepOutcome::Point { scorer }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_state(seed: u64) -> (MatchState, Uuid, Uuid) {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        (MatchState::new([a, b], GameConfig::default(), seed), a, b)
    }

    /// Keep both paddles pinned to the top edge so every serve misses
    fn park_paddles(state: &mut MatchState) {
        let top = state.config.paddle_min_y();
        let players = state.players;
        for (seat, conn_id) in players.into_iter().enumerate() {
            state.paddles[seat].y = top;
            state.set_direction(conn_id, Direction::Up).unwrap();
        }
    }

    fn run_until_point(state: &mut MatchState) -> StepOutcome {
        for _ in 0..10_000 {
            let outcome = state.step();
            if outcome != StepOutcome::Continue {
                return outcome;
            }
        }
        panic!("no point scored");
    }

    #[test]
    fn test_serve_alternates_and_speeds_up() {
        let (mut state, _, _) = new_state(7);
        state.start();
        let first_vx = state.ball.vx;
        let speed = state.config.ball_initial_speed;
        assert!(first_vx < 0.0);
        assert!((state.ball.vx.hypot(state.ball.vy) - speed).abs() < 1e-3);

        state.initialize_objects();
        assert!(state.ball.vx > 0.0);
        assert!((state.ball_speed - (speed + state.config.ball_speed_increment)).abs() < 1e-3);

        state.initialize_objects();
        assert!(state.ball.vx < 0.0);
    }

    #[test]
    fn test_serve_angle_within_cone() {
        let (mut state, _, _) = new_state(42);
        state.start();
        for _ in 0..200 {
            let angle = (state.ball.vy / state.ball.vx.abs()).atan();
            assert!(angle.abs() <= state.config.launch_half_angle + 1e-4);
            state.initialize_objects();
        }
    }

    #[test]
    fn test_step_is_noop_until_running() {
        let (mut state, _, _) = new_state(1);
        state.start();
        let x = state.ball.x;
        assert_eq!(state.step(), StepOutcome::Continue);
        assert_eq!(state.ball.x, x);

        state.resume();
        state.step();
        assert_ne!(state.ball.x, x);
    }

    #[test]
    fn test_top_wall_flips_vertical_only() {
        let (mut state, _, _) = new_state(1);
        state.start();
        state.resume();
        state.ball.x = 400.0;
        state.ball.y = state.ball.radius + 1.0;
        state.ball.vx = 200.0;
        state.ball.vy = -200.0;

        state.step();
        assert!(state.ball.vy > 0.0);
        assert!(state.ball.vx > 0.0);
    }

    #[test]
    fn test_bottom_wall_flips_vertical_only() {
        let (mut state, _, _) = new_state(1);
        state.start();
        state.resume();
        state.ball.x = 400.0;
        state.ball.y = state.config.field_height - state.ball.radius - 1.0;
        state.ball.vx = -200.0;
        state.ball.vy = 200.0;

        state.step();
        assert!(state.ball.vy < 0.0);
        assert!(state.ball.vx < 0.0);
        assert_eq!(state.scores, [0, 0]);
    }

    #[test]
    fn test_paddle_hit_flips_horizontal_and_uses_offset() {
        let (mut state, _, _) = new_state(1);
        state.start();
        state.resume();

        let paddle = state.paddles[0].clone();
        // Strike the lower quarter of the left paddle, moving left and up
        state.ball.x = paddle.x + paddle.width + state.ball.radius + 1.0;
        state.ball.y = paddle.y + paddle.height * 0.75;
        state.ball.vx = -300.0;
        state.ball.vy = -10.0;

        assert_eq!(state.step(), StepOutcome::Continue);
        assert!(state.ball.vx > 0.0);
        // Hit below centre sends the ball downward regardless of incoming vy
        assert!(state.ball.vy > 0.0);
        let expected = hit_offset(&state.ball, &state.paddles[0]) * state.ball_speed;
        assert!((state.ball.vy - expected).abs() < 1e-3);
    }

    #[test]
    fn test_paddle_ignored_when_ball_moves_away() {
        let (mut state, _, _) = new_state(1);
        state.start();
        state.resume();

        let paddle = state.paddles[0].clone();
        state.ball.x = paddle.x + paddle.width + 2.0;
        state.ball.y = paddle.center_y();
        state.ball.vx = 300.0;
        state.ball.vy = 0.0;

        state.step();
        assert!(state.ball.vx > 0.0);
    }

    #[test]
    fn test_left_goal_scores_for_player2() {
        let (mut state, _, _) = new_state(3);
        state.start();
        state.resume();
        park_paddles(&mut state);

        let outcome = run_until_point(&mut state);
        assert_eq!(outcome, StepOutcome::Point { scorer: 1 });
        assert_eq!(state.scores, [0, 1]);
        assert_eq!(state.phase, MatchPhase::Paused);
        // Re-served toward player2 this time
        assert!(state.ball.vx > 0.0);
        assert_eq!(state.ball.x, state.config.field_width / 2.0);
    }

    #[test]
    fn test_match_finishes_at_max_score() {
        let (mut state, _, _) = new_state(11);
        state.start();

        let mut last = [0, 0];
        loop {
            park_paddles(&mut state);
            state.resume();
            let outcome = run_until_point(&mut state);
            assert!(state.scores[0] >= last[0] && state.scores[1] >= last[1]);
            assert!(state.scores.iter().all(|s| *s <= state.config.max_score));
            last = state.scores;
            if let StepOutcome::Finished { winner } = outcome {
                assert_eq!(state.scores[winner], state.config.max_score);
                break;
            }
        }
        assert_eq!(state.phase, MatchPhase::Finished);
        // Serves alternate and nobody returns, so player2 wins 11-10
        assert_eq!(state.scores, [10, 11]);
    }

    #[test]
    fn test_set_direction_unknown_player() {
        let (mut state, _, _) = new_state(1);
        let stranger = Uuid::new_v4();
        assert_eq!(
            state.set_direction(stranger, Direction::Up),
            Err(EngineError::UnknownPlayer(stranger))
        );
    }
}
