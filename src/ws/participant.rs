//! Handlers open to every connection in a lobby

use crate::broadcast::{self, connections_message};
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::now_millis;
use std::sync::Arc;

use super::Session;

pub const MIN_NAME_CHARS: usize = 1;
pub const MAX_NAME_CHARS: usize = 25;

/// Resync read, includes the latency lookahead
pub async fn handle_get_video(state: &Arc<AppState>, session: &Session) -> Option<ServerMessage> {
    let lobbies = state.lobbies.read().await;
    let lobby = lobbies.get(&session.lobby_id)?;
    Some(broadcast::video_message(lobby, now_millis(), true))
}

pub async fn handle_chat(
    state: &Arc<AppState>,
    session: &Session,
    message: String,
) -> Option<ServerMessage> {
    if !broadcast::is_acceptable_chat(&message) {
        tracing::debug!(connection = %session.connection_id, "Dropping oversize chat message");
        return None;
    }

    let lobbies = state.lobbies.read().await;
    let lobby = lobbies.get(&session.lobby_id)?;
    tracing::info!(lobby = %session.lobby_id, connection = %session.connection_id, "Chat: {}", message);
    broadcast::send_to_all(lobby, |l, _| {
        broadcast::chat_message(l, &session.connection_id, &message)
    });
    None
}

pub async fn handle_rename(
    state: &Arc<AppState>,
    session: &Session,
    name: String,
) -> Option<ServerMessage> {
    let len = name.chars().count();
    if !(MIN_NAME_CHARS..=MAX_NAME_CHARS).contains(&len) {
        tracing::debug!(connection = %session.connection_id, len, "Dropping invalid name");
        return None;
    }

    let mut lobbies = state.lobbies.write().await;
    let lobby = lobbies.get_mut(&session.lobby_id)?;
    let connection = lobby.connections.get_mut(&session.connection_id)?;
    tracing::info!(
        "{} ({}) has renamed themselves to {}",
        connection.username,
        session.connection_id,
        name
    );
    connection.username = name;
    broadcast::send_to_all(lobby, connections_message);
    None
}
