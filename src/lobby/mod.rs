//! Lobbies: sessions, invites, and the registry that owns them

pub mod error;
pub mod registry;
pub mod session;

pub use error::LobbyError;
pub use registry::{RegistrySettings, SessionRegistry};
pub use session::SessionStatus;
