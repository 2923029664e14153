//! Paddle and ball bodies, movement and collision tests

use serde::{Deserialize, Serialize};

use super::config::GameConfig;

/// Paddle movement intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    #[default]
    None,
}

impl Direction {
    /// Sign applied to the paddle speed (screen coordinates, y grows downward)
    pub fn sign(self) -> f32 {
        match self {
            Direction::Up => -1.0,
            Direction::Down => 1.0,
            Direction::None => 0.0,
        }
    }
}

/// A paddle. `x`/`y` is the top-left corner.
#[derive(Debug, Clone)]
pub struct Paddle {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub speed: f32,
    /// Current vertical velocity (units per second)
    pub velocity: f32,
    pub direction: Direction,
}

impl Paddle {
    pub fn new(x: f32, config: &GameConfig) -> Self {
        Self {
            x,
            y: (config.field_height - config.paddle_height) / 2.0,
            width: config.paddle_width,
            height: config.paddle_height,
            speed: config.paddle_speed,
            velocity: 0.0,
            direction: Direction::None,
        }
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    /// Move one step in the current direction and clamp into the field
    pub fn advance(&mut self, dt: f32, min_y: f32, max_y: f32) {
        self.velocity = self.direction.sign() * self.speed;
        self.y = (self.y + self.velocity * dt).clamp(min_y, max_y);
    }
}

/// The ball. `x`/`y` is the centre.
#[derive(Debug, Clone)]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub vx: f32,
    pub vy: f32,
}

impl Ball {
    pub fn advance(&mut self, dt: f32) {
        self.x += self.vx * dt;
        self.y += self.vy * dt;
    }
}

/// Circle against axis-aligned rectangle: clamp the centre onto the
/// rectangle and compare squared distance with the squared radius.
pub fn circle_intersects_rect(
    cx: f32,
    cy: f32,
    radius: f32,
    rx: f32,
    ry: f32,
    rw: f32,
    rh: f32,
) -> bool {
    let closest_x = cx.clamp(rx, rx + rw);
    let closest_y = cy.clamp(ry, ry + rh);
    let dx = cx - closest_x;
    let dy = cy - closest_y;
    dx * dx + dy * dy <= radius * radius
}

/// Where along the paddle the ball struck, in [-1, 1] (top edge is -1)
pub fn hit_offset(ball: &Ball, paddle: &Paddle) -> f32 {
    let half = paddle.height / 2.0;
    ((ball.y - paddle.center_y()) / half).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circle_rect_overlap_on_face() {
        // Ball touching the right face of a paddle at x=10..20
        assert!(circle_intersects_rect(27.0, 50.0, 8.0, 10.0, 0.0, 10.0, 100.0));
        assert!(!circle_intersects_rect(29.0, 50.0, 8.0, 10.0, 0.0, 10.0, 100.0));
    }

    #[test]
    fn test_circle_rect_corner_uses_true_distance() {
        // Inside the bounding box expanded by the radius, but outside the rounded corner
        assert!(!circle_intersects_rect(26.0, -6.0, 8.0, 10.0, 0.0, 10.0, 100.0));
        assert!(circle_intersects_rect(24.0, -4.0, 8.0, 10.0, 0.0, 10.0, 100.0));
    }

    #[test]
    fn test_paddle_clamps_to_bounds() {
        let config = GameConfig::default();
        let mut paddle = Paddle::new(config.paddle_margin, &config);

        paddle.direction = Direction::Up;
        for _ in 0..1000 {
            paddle.advance(config.dt(), config.paddle_min_y(), config.paddle_max_y());
        }
        assert_eq!(paddle.y, config.paddle_min_y());

        paddle.direction = Direction::Down;
        for _ in 0..1000 {
            paddle.advance(config.dt(), config.paddle_min_y(), config.paddle_max_y());
            assert!(paddle.y >= config.paddle_min_y() && paddle.y <= config.paddle_max_y());
        }
        assert_eq!(paddle.y, config.paddle_max_y());
    }

    #[test]
    fn test_hit_offset_range() {
        let config = GameConfig::default();
        let paddle = Paddle::new(config.paddle_margin, &config);
        let mut ball = Ball { x: 0.0, y: paddle.center_y(), radius: 8.0, vx: 0.0, vy: 0.0 };
        assert_eq!(hit_offset(&ball, &paddle), 0.0);

        ball.y = paddle.y - 5.0;
        assert_eq!(hit_offset(&ball, &paddle), -1.0);

        ball.y = paddle.y + paddle.height * 0.75;
        assert!((hit_offset(&ball, &paddle) - 0.5).abs() < 1e-5);
    }
}
