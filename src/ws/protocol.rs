//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::Direction;

/// How a session came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Filled by the matchmaking queue
    Queued,
    /// Created explicitly, gated by an invite list
    Custom,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Open a custom session and take the first seat
    CreateSession,

    /// Take a seat in an existing session
    JoinSession { session_id: Uuid },

    /// Invite a user into the caller's session
    Invite { user_id: Uuid },

    /// Ready handshake
    SetReady { ready: bool },

    /// Enter the unranked matchmaking queue
    JoinQueue,

    /// Leave the matchmaking queue
    LeaveQueue,

    /// Leave the current session
    LeaveSession,

    /// Paddle intent for the next simulation step
    MovePaddle { direction: Direction },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        user_id: Uuid,
        connection_id: Uuid,
        server_time: u64,
    },

    /// The recipient was seated in a session
    SessionJoined {
        session_id: Uuid,
        mode: SessionMode,
        players: Vec<PlayerInfo>,
    },

    /// Out-of-band invitation into someone's session
    Invite {
        session_id: Uuid,
        from: PlayerInfo,
    },

    /// Match configuration; everything a client needs to render
    Start {
        player1: Uuid,
        player2: Uuid,
        field: FieldInfo,
        paddle: PaddleInfo,
        paddle1: PaddleSnapshot,
        paddle2: PaddleSnapshot,
        ball: BallSnapshot,
        /// Fixed simulation step in milliseconds
        timestep_ms: f32,
        max_score: u32,
    },

    /// Countdown tick, descending to 0
    Countdown { seconds: u32 },

    /// Simulation state after one fixed step
    State {
        paddle1: PaddleSnapshot,
        paddle2: PaddleSnapshot,
        ball: BallSnapshot,
    },

    /// Someone scored
    Score {
        player1_score: u32,
        player2_score: u32,
    },

    /// Last event of a match. `winner` is null when the match was aborted.
    Finish {
        winner: Option<PlayerInfo>,
        player1_score: u32,
        player2_score: u32,
    },

    /// Informational text
    Message { text: String },

    /// Rejected command
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Public identity of a player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub user_id: Uuid,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldInfo {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaddleInfo {
    pub width: f32,
    pub height: f32,
    pub speed: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaddleSnapshot {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    /// Vertical velocity
    pub velocity: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallSnapshot {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub velocity: Velocity,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_msg_wire_format() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"move_paddle","direction":"up"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::MovePaddle { direction: Direction::Up }));

        let msg: ClientMsg = serde_json::from_str(r#"{"type":"set_ready","ready":true}"#).unwrap();
        assert!(matches!(msg, ClientMsg::SetReady { ready: true }));
    }

    #[test]
    fn test_finish_serializes_null_winner() {
        let msg = ServerMsg::Finish {
            winner: None,
            player1_score: 3,
            player2_score: 1,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "finish");
        assert!(json["winner"].is_null());
        assert_eq!(json["player1_score"], 3);
    }
}
