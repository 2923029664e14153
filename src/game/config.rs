//! Gameplay constants shared by the simulation and the start payload

use std::f32::consts::PI;
use std::time::Duration;

/// Simulation rate
pub const SIMULATION_TPS: u32 = 60;

/// Seats per session
pub const MAX_SEATS: usize = 2;

/// Tunable match parameters. Defaults are the balance every client expects.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub field_width: f32,
    pub field_height: f32,

    pub paddle_width: f32,
    pub paddle_height: f32,
    /// Units per second
    pub paddle_speed: f32,
    /// Gap kept between a paddle and the field edges
    pub paddle_margin: f32,

    pub ball_radius: f32,
    /// Units per second at the first serve
    pub ball_initial_speed: f32,
    /// Added to the ball speed on every serve after the first
    pub ball_speed_increment: f32,
    /// Half-angle of the serve cone around the horizontal, in radians
    pub launch_half_angle: f32,

    /// Fixed simulation step
    pub timestep: Duration,
    pub max_score: u32,

    /// Seconds counted down before the first serve
    pub start_countdown_secs: u32,
    /// Seconds counted down after each point
    pub point_countdown_secs: u32,
}

impl GameConfig {
    /// Timestep in seconds, as used by the physics
    pub fn dt(&self) -> f32 {
        self.timestep.as_secs_f32()
    }

    /// Lowest y a paddle's top edge may take
    pub fn paddle_min_y(&self) -> f32 {
        self.paddle_margin
    }

    /// Highest y a paddle's top edge may take
    pub fn paddle_max_y(&self) -> f32 {
        self.field_height - self.paddle_height - self.paddle_margin
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            field_width: 800.0,
            field_height: 600.0,
            paddle_width: 10.0,
            paddle_height: 100.0,
            paddle_speed: 400.0,
            paddle_margin: 10.0,
            ball_radius: 8.0,
            ball_initial_speed: 300.0,
            ball_speed_increment: 25.0,
            launch_half_angle: PI / 8.0,
            timestep: Duration::from_micros(1_000_000 / SIMULATION_TPS as u64),
            max_score: 11,
            start_countdown_secs: 3,
            point_countdown_secs: 2,
        }
    }
}
