//! HTTP route definitions

use axum::{
    extract::{Extension, State},
    http::{header, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::http::middleware::{require_auth, AuthenticatedUser};
use crate::lobby::{LobbyError, SessionStatus};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/sessions/invite", post(chat_invite_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_sessions: usize,
    sessions_by_status: BTreeMap<SessionStatus, usize>,
    seated_players: usize,
    queue_size: usize,
    oldest_queue_wait_secs: Option<u64>,
    connections: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_sessions: state.registry.session_count(),
        sessions_by_status: state.registry.status_counts(),
        seated_players: state.registry.seated_count(),
        queue_size: state.registry.queue_len(),
        oldest_queue_wait_secs: state.registry.oldest_queue_wait().map(|d| d.as_secs()),
        connections: state.hub.len(),
    })
}

// ============================================================================
// Chat-originated invites
// ============================================================================

#[derive(Deserialize)]
struct InviteRequest {
    target_user_id: Uuid,
}

#[derive(Serialize)]
struct InviteResponse {
    session_id: Uuid,
}

async fn chat_invite_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(req): Json<InviteRequest>,
) -> Result<Json<InviteResponse>, AppError> {
    let session_id = state
        .registry
        .invite_from_chat(auth.user_id, req.target_user_id)
        .await?;

    info!(user_id = %auth.user_id, session_id = %session_id, "Chat invite accepted");
    Ok(Json(InviteResponse { session_id }))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<LobbyError> for AppError {
    fn from(e: LobbyError) -> Self {
        match e {
            LobbyError::NotInSession
            | LobbyError::InviterNotSeated
            | LobbyError::SessionNotFound => AppError::NotFound(e.to_string()),
            LobbyError::Store(_) => AppError::Internal(e.to_string()),
            _ => AppError::BadRequest(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lobby_error_status_mapping() {
        let status = |e: LobbyError| AppError::from(e).into_response().status();

        assert_eq!(status(LobbyError::NotInSession), StatusCode::NOT_FOUND);
        assert_eq!(status(LobbyError::InviterNotSeated), StatusCode::NOT_FOUND);
        assert_eq!(status(LobbyError::Blocked), StatusCode::BAD_REQUEST);
        assert_eq!(status(LobbyError::SelfInvite), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(LobbyError::Store("timeout".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
