//! Match simulation: physics, the fixed-timestep engine task, and its wire snapshots

pub mod config;
pub mod r#match;
pub mod physics;
pub mod snapshot;
pub mod state;

pub use config::{GameConfig, MAX_SEATS};
pub use physics::Direction;
pub use r#match::{GameMatch, MatchHandle};
pub use state::EngineError;
