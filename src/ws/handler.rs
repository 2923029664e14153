//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::http::middleware::verify_jwt;
use crate::lobby::{LobbyError, SessionRegistry};
use crate::store::profiles::fallback_name;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::hub::PlayerHandle;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// JWT token for authentication
    pub token: String,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    // Verify JWT token before upgrading
    match verify_jwt(&query.token, &state.config.supabase_jwt_secret) {
        Ok(claims) => {
            info!(user_id = %claims.sub, "WebSocket upgrade for authenticated user");
            ws.on_upgrade(move |socket| handle_socket(socket, claims.sub, state))
        }
        Err(e) => {
            warn!(error = %e, "WebSocket auth failed");
            (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
        }
    }
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, user_id: Uuid, state: AppState) {
    let (ws_sink, ws_stream) = socket.split();

    let display_name = match state.profile_store.display_name(user_id).await {
        Ok(name) => name,
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Failed to fetch profile");
            fallback_name(user_id)
        }
    };

    let (player, rx) = PlayerHandle::new(user_id, display_name);
    state.hub.register(player.clone());
    info!(
        user_id = %user_id,
        conn_id = %player.conn_id,
        connections = state.hub.len(),
        "New WebSocket connection"
    );

    player.send(ServerMsg::Welcome {
        user_id,
        connection_id: player.conn_id,
        server_time: unix_millis(),
    });

    run_session(&state.registry, &player, ws_sink, ws_stream, rx).await;

    // Cleanup on disconnect
    state.registry.disconnect(&player);
    state.hub.unregister(&player.conn_id);

    info!(user_id = %user_id, conn_id = %player.conn_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    registry: &SessionRegistry,
    player: &PlayerHandle,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut rx: mpsc::UnboundedReceiver<ServerMsg>,
) {
    let rate_limiter = ConnectionRateLimiter::new();

    // Writer task: queued events -> WebSocket
    let conn_id = player.conn_id;
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> lobby commands
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(user_id = %player.user_id, "Rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => {
                        if let Err(e) = dispatch(registry, player, client_msg).await {
                            debug!(user_id = %player.user_id, code = e.code(), "Command rejected");
                            player.send(ServerMsg::Error {
                                code: e.code().to_string(),
                                message: e.to_string(),
                            });
                        }
                    }
                    Err(e) => {
                        warn!(
                            user_id = %player.user_id,
                            error = %e,
                            "Failed to parse client message"
                        );
                        player.send(ServerMsg::Error {
                            code: "bad_message".to_string(),
                            message: "Could not parse message".to_string(),
                        });
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(user_id = %player.user_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(user_id = %player.user_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(user_id = %player.user_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Route one client command into the lobby core
async fn dispatch(
    registry: &SessionRegistry,
    player: &PlayerHandle,
    msg: ClientMsg,
) -> Result<(), LobbyError> {
    match msg {
        ClientMsg::CreateSession => registry.create_custom_session(player).map(|_| ()),
        ClientMsg::JoinSession { session_id } => registry.join_session(player, session_id),
        ClientMsg::Invite { user_id } => registry.invite_to_session(player, user_id).await,
        ClientMsg::SetReady { ready } => registry.set_ready(player, ready),
        ClientMsg::JoinQueue => registry.enqueue(player),
        ClientMsg::LeaveQueue => registry.dequeue(player),
        ClientMsg::LeaveSession => registry.leave(player, true),
        ClientMsg::MovePaddle { direction } => registry.move_paddle(player, direction),
        ClientMsg::Ping { t } => {
            player.send(ServerMsg::Pong { t });
            Ok(())
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameConfig;
    use crate::lobby::RegistrySettings;
    use crate::store::memory::{MemoryBlockList, MemoryMatchStore};
    use crate::ws::hub::ConnectionHub;
    use std::sync::Arc;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(
            Arc::new(ConnectionHub::new()),
            Arc::new(MemoryBlockList::default()),
            Arc::new(MemoryMatchStore::default()),
            GameConfig::default(),
            RegistrySettings::default(),
        )
    }

    #[tokio::test]
    async fn test_dispatch_routes_commands() {
        let registry = registry();
        let (player, mut rx) = PlayerHandle::new(Uuid::new_v4(), "ann".to_string());

        dispatch(&registry, &player, ClientMsg::Ping { t: 42 }).await.unwrap();
        assert!(matches!(rx.try_recv(), Ok(ServerMsg::Pong { t: 42 })));

        dispatch(&registry, &player, ClientMsg::JoinQueue).await.unwrap();
        assert!(registry.is_queued(&player.conn_id));
        assert_eq!(
            dispatch(&registry, &player, ClientMsg::CreateSession).await,
            Err(LobbyError::AlreadyQueued)
        );

        dispatch(&registry, &player, ClientMsg::LeaveQueue).await.unwrap();
        dispatch(&registry, &player, ClientMsg::CreateSession).await.unwrap();
        assert!(registry.session_of(&player.conn_id).is_some());

        assert_eq!(
            dispatch(&registry, &player, ClientMsg::SetReady { ready: true }).await,
            Ok(())
        );
        dispatch(&registry, &player, ClientMsg::LeaveSession).await.unwrap();
        assert_eq!(registry.session_count(), 0);
        assert_eq!(
            dispatch(&registry, &player, ClientMsg::LeaveSession).await,
            Err(LobbyError::NotInSession)
        );
    }
}
