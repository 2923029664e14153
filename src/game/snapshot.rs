//! Builds wire messages from simulation state

use uuid::Uuid;

use crate::ws::protocol::{
    BallSnapshot, FieldInfo, PaddleInfo, PaddleSnapshot, ServerMsg, Velocity,
};

use super::physics::{Ball, Paddle};
use super::state::MatchState;

fn paddle_snapshot(paddle: &Paddle) -> PaddleSnapshot {
    PaddleSnapshot {
        x: paddle.x,
        y: paddle.y,
        w: paddle.width,
        h: paddle.height,
        velocity: paddle.velocity,
    }
}

fn ball_snapshot(ball: &Ball) -> BallSnapshot {
    BallSnapshot {
        x: ball.x,
        y: ball.y,
        radius: ball.radius,
        velocity: Velocity {
            x: ball.vx,
            y: ball.vy,
        },
    }
}

/// `start` payload; `user_ids` are the public ids of player1 and player2
pub fn start_msg(state: &MatchState, user_ids: [Uuid; 2]) -> ServerMsg {
    let config = &state.config;
    ServerMsg::Start {
        player1: user_ids[0],
        player2: user_ids[1],
        field: FieldInfo {
            width: config.field_width,
            height: config.field_height,
        },
        paddle: PaddleInfo {
            width: config.paddle_width,
            height: config.paddle_height,
            speed: config.paddle_speed,
        },
        paddle1: paddle_snapshot(&state.paddles[0]),
        paddle2: paddle_snapshot(&state.paddles[1]),
        ball: ball_snapshot(&state.ball),
        timestep_ms: config.timestep.as_secs_f32() * 1000.0,
        max_score: config.max_score,
    }
}

pub fn state_msg(state: &MatchState) -> ServerMsg {
    ServerMsg::State {
        paddle1: paddle_snapshot(&state.paddles[0]),
        paddle2: paddle_snapshot(&state.paddles[1]),
        ball: ball_snapshot(&state.ball),
    }
}

pub fn score_msg(state: &MatchState) -> ServerMsg {
    ServerMsg::Score {
        player1_score: state.scores[0],
        player2_score: state.scores[1],
    }
}
