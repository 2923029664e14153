//! Rejections for lobby commands

use crate::game::EngineError;

/// Every precondition a lobby command can fail. The message is shown to
/// the player as-is.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum LobbyError {
    #[error("You are already in a lobby")]
    AlreadyInSession,

    #[error("You are already in the matchmaking queue")]
    AlreadyQueued,

    #[error("You are not in the matchmaking queue")]
    NotQueued,

    #[error("Lobby not found")]
    SessionNotFound,

    #[error("You have not been invited to this lobby")]
    NotInvited,

    #[error("Lobby is full")]
    SessionFull,

    #[error("You are already in this lobby")]
    AlreadyInThisSession,

    #[error("You are not in a lobby")]
    NotInSession,

    #[error("Cannot invite: you are not in a lobby")]
    InviterNotSeated,

    #[error("Cannot invite: you cannot invite yourself")]
    SelfInvite,

    #[error("Cannot invite: that player is already in a lobby")]
    TargetInSession,

    #[error("Cannot invite: that player has already been invited")]
    AlreadyInvited,

    #[error("Cannot invite: that player is not accepting invites from you")]
    Blocked,

    #[error("No match is running in this lobby")]
    MatchNotRunning,

    #[error("Match rejected input: {0}")]
    Engine(#[from] EngineError),

    #[error("Lookup failed: {0}")]
    Store(String),
}

impl LobbyError {
    /// Stable machine-readable code for `ServerMsg::Error`
    pub fn code(&self) -> &'static str {
        match self {
            LobbyError::AlreadyInSession => "already_in_session",
            LobbyError::AlreadyQueued => "already_queued",
            LobbyError::NotQueued => "not_queued",
            LobbyError::SessionNotFound => "session_not_found",
            LobbyError::NotInvited => "not_invited",
            LobbyError::SessionFull => "session_full",
            LobbyError::AlreadyInThisSession => "already_in_this_session",
            LobbyError::NotInSession => "not_in_session",
            LobbyError::InviterNotSeated => "inviter_not_seated",
            LobbyError::SelfInvite => "self_invite",
            LobbyError::TargetInSession => "target_in_session",
            LobbyError::AlreadyInvited => "already_invited",
            LobbyError::Blocked => "blocked",
            LobbyError::MatchNotRunning => "match_not_running",
            LobbyError::Engine(_) => "engine",
            LobbyError::Store(_) => "store",
        }
    }
}
