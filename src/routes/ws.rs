//! WebSocket handler — the real-time collaboration socket.
//!
//! DESIGN
//! ======
//! Every connection is authenticated BEFORE the protocol upgrade: a bad
//! `?token=` is rejected with a plain HTTP status and no socket ever exists.
//! Admitted connections get a fresh connection id and enter a `select!` loop:
//! - Inbound client events → decode + dispatch by event kind
//! - Events broadcast by room peers → forward to this client
//!
//! Dispatch owns all outbound concerns. It broadcasts to peers through the
//! session registry and returns the events destined for the sender, so the
//! whole protocol is testable without a socket.
//!
//! LIFECYCLE
//! =========
//! 1. Gate: verify `?token=`, resolve the account, then upgrade
//! 2. Send `connected` with the connection id
//! 3. Client events → dispatch → broadcasts to peers, replies to sender
//! 4. Close → remove from every joined room, `participant-left` per room

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::protocol::{ClientEvent, ServerEvent, decode_client_event};
use crate::services::auth::{self, AuthError, AuthedUser};
use crate::services::room;
use crate::state::AppState;

/// Outbound queue depth per connection. A member whose queue is full gets
/// events dropped rather than stalling the whole room.
const OUTBOUND_BUFFER: usize = 256;

// =============================================================================
// UPGRADE GATE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(token) = params.get("token") else {
        return (StatusCode::UNAUTHORIZED, "token required").into_response();
    };

    let user = match auth::authenticate_token(&state.pool, &state.jwt, token).await {
        Ok(user) => user,
        Err(AuthError::Db(e)) => {
            tracing::error!(error = %e, "ws: token validation failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "token validation error").into_response();
        }
        Err(e) => {
            warn!(error = %e, "ws: connection rejected");
            return (StatusCode::UNAUTHORIZED, "invalid or expired token").into_response();
        }
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, user))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, user: AuthedUser) {
    let conn_id = Uuid::new_v4();

    // Per-connection channel for events broadcast by room peers.
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(OUTBOUND_BUFFER);

    let welcome =
        ServerEvent::Connected { connection_id: conn_id, user_id: user.id, display_name: user.username.clone() };
    if send_event(&mut socket, &welcome).await.is_err() {
        return;
    }

    info!(%conn_id, user_id = %user.id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies = process_client_text(&state, conn_id, &user, &tx, &text).await;
                        for event in replies {
                            let _ = send_event(&mut socket, &event).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(event) = rx.recv() => {
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    disconnect_cleanup(&state, conn_id, &user).await;
    info!(%conn_id, "ws: client disconnected");
}

/// Remove the connection from every room it joined and announce the departure
/// to each. Removal happens first, so no announcement is relayed back to the
/// dead connection.
async fn disconnect_cleanup(state: &AppState, conn_id: Uuid, user: &AuthedUser) {
    for project_id in room::disconnect(&state.registry, conn_id).await {
        let left = ServerEvent::ParticipantLeft {
            user_id: user.id,
            display_name: user.username.clone(),
            connection_id: conn_id,
        };
        room::broadcast(&state.registry, project_id, &left, Some(conn_id)).await;
    }
}

// =============================================================================
// EVENT DISPATCH
// =============================================================================

/// Decode and process one inbound text message, returning the events destined
/// for the sender. Peer broadcasts happen in here, so tests can drive the
/// whole protocol without a socket.
async fn process_client_text(
    state: &AppState,
    conn_id: Uuid,
    user: &AuthedUser,
    tx: &mpsc::Sender<ServerEvent>,
    text: &str,
) -> Vec<ServerEvent> {
    let event = match decode_client_event(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(%conn_id, error = %e, "ws: malformed message dropped");
            if state.ws_notify_malformed {
                return vec![ServerEvent::error_from(&e)];
            }
            return Vec::new();
        }
    };

    // Cursor traffic is too chatty to log per message.
    if !matches!(event, ClientEvent::CursorChange { .. }) {
        info!(%conn_id, event = event.name(), project_id = %event.project_id(), "ws: recv event");
    }

    match event {
        ClientEvent::JoinRoom { project_id } => {
            let roster =
                room::join_room(&state.registry, project_id, conn_id, user.id, &user.username, tx.clone()).await;

            let joined = ServerEvent::ParticipantJoined {
                user_id: user.id,
                display_name: user.username.clone(),
                connection_id: conn_id,
            };
            room::broadcast(&state.registry, project_id, &joined, Some(conn_id)).await;

            vec![ServerEvent::RoomParticipants { participants: roster }]
        }
        ClientEvent::LeaveRoom { project_id } => {
            // A leave for a room the connection is not in is a no-op: nothing
            // to remove, nobody to notify.
            if room::leave_room(&state.registry, project_id, conn_id).await.is_ok() {
                let left = ServerEvent::ParticipantLeft {
                    user_id: user.id,
                    display_name: user.username.clone(),
                    connection_id: conn_id,
                };
                room::broadcast(&state.registry, project_id, &left, Some(conn_id)).await;
            }
            Vec::new()
        }
        ClientEvent::FileChange { project_id, file_path, content, cursor } => {
            let changed = ServerEvent::FileChanged {
                file_path,
                content,
                user_id: user.id,
                display_name: user.username.clone(),
                cursor,
            };
            room::broadcast(&state.registry, project_id, &changed, Some(conn_id)).await;
            Vec::new()
        }
        ClientEvent::CursorChange { project_id, file_path, cursor } => {
            // Non-members get no stored cursor (a leave can race the cursor
            // message), but the relay still goes out.
            room::update_cursor(&state.registry, project_id, conn_id, &cursor).await;

            let changed = ServerEvent::CursorChanged {
                file_path,
                cursor,
                user_id: user.id,
                display_name: user.username.clone(),
            };
            room::broadcast(&state.registry, project_id, &changed, Some(conn_id)).await;
            Vec::new()
        }
        ClientEvent::FileOperation { project_id, operation, file_path, new_path, is_folder } => {
            let op = ServerEvent::FileOperation {
                project_id,
                operation,
                file_path,
                new_path,
                is_folder,
                user_id: user.id,
                display_name: user.username.clone(),
            };
            room::broadcast(&state.registry, project_id, &op, Some(conn_id)).await;
            Vec::new()
        }
        ClientEvent::ExecutionBroadcast { project_id, result } => {
            let executed =
                ServerEvent::ExecutionBroadcast { result, user_id: user.id, display_name: user.username.clone() };
            room::broadcast(&state.registry, project_id, &executed, Some(conn_id)).await;
            Vec::new()
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> Result<(), ()> {
    let json = match serde_json::to_string(event) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize event");
            return Err(());
        }
    };
    if !matches!(event, ServerEvent::CursorChanged { .. }) {
        info!(event = event.name(), "ws: send event");
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
