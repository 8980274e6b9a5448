//! WebSocket endpoints for registration and heartbeats.
//!
//! Each upgraded connection gets its own [`StatusSession`] and task. Text
//! frames are fed to the session one at a time; nothing is written back
//! except the closing handshake after a deregistration.

use crate::server::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use snoop_core::{RegistryConfig, SessionEvent, StatusSession};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registration endpoint. The channel's identity comes from the first descriptor.
pub async fn handle_registration_channel(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let session = StatusSession::registration(state.registry.clone());
    ws.max_message_size(RegistryConfig::MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| run_session(socket, session))
}

/// Heartbeat endpoint for one identity.
///
/// Registers that the client is still there and updates its descriptor if
/// it changed. An empty message deregisters the identity.
pub async fn handle_heartbeat_channel(
    ws: WebSocketUpgrade,
    Path(identity): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let session = StatusSession::heartbeat(state.registry.clone(), identity);
    ws.max_message_size(RegistryConfig::MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| run_session(socket, session))
}

async fn run_session(mut socket: WebSocket, mut session: StatusSession) {
    debug!(
        "Session {} opened for {}",
        session.id(),
        session.identity().unwrap_or("<unregistered>")
    );

    while let Some(frame) = socket.recv().await {
        let payload = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    warn!("Session {}: dropping non UTF-8 frame", session.id());
                    continue;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("Session {} ended: {}", session.id(), e);
                break;
            }
        };

        match session.handle(&payload) {
            SessionEvent::Registered { identity } => info!("Client {} is up", identity),
            SessionEvent::Deregistered { identity } => info!("Client {} signed off", identity),
            _ => {}
        }

        if session.is_closed() {
            let _ = socket.send(Message::Close(None)).await;
            break;
        }
    }

    debug!(
        "Session {} closed in state {}",
        session.id(),
        session.state()
    );
}
