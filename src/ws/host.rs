//! Host-only command handlers
//!
//! Every handler here verifies that the sender is the lobby's current host
//! before mutating anything. Non-host requests are no-ops.

use crate::broadcast::{self, connections_message};
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::{now_millis, ConnectionId, MpvCommand};
use std::sync::Arc;

use super::Session;

/// Return early unless the session's connection is host of `$lobby`
macro_rules! require_host {
    ($lobby:expr, $session:expr, $action:expr) => {
        if !$lobby.is_host(&$session.connection_id) {
            tracing::warn!(
                lobby = %$session.lobby_id,
                connection = %$session.connection_id,
                "Only host can {}",
                $action
            );
            return None;
        }
    };
}

pub async fn handle_play(
    state: &Arc<AppState>,
    session: &Session,
    play: bool,
    time: Option<f64>,
) -> Option<ServerMessage> {
    let mut lobbies = state.lobbies.write().await;
    let lobby = lobbies.get_mut(&session.lobby_id)?;
    require_host!(lobby, session, "play or pause");

    let now = now_millis();
    lobby.set_playing(play);
    if let Some(time) = time {
        lobby.set_time(time, now);
    }
    broadcast::send_to_all(lobby, |l, _| Some(broadcast::video_message(l, now, false)));
    None
}

pub async fn handle_time(
    state: &Arc<AppState>,
    session: &Session,
    time: f64,
) -> Option<ServerMessage> {
    let mut lobbies = state.lobbies.write().await;
    let lobby = lobbies.get_mut(&session.lobby_id)?;
    require_host!(lobby, session, "seek");

    let now = now_millis();
    lobby.set_time(time, now);
    broadcast::send_to_all(lobby, |l, _| Some(broadcast::video_message(l, now, false)));
    None
}

pub async fn handle_url(
    state: &Arc<AppState>,
    session: &Session,
    url: String,
    subsurl: String,
) -> Option<ServerMessage> {
    let mut lobbies = state.lobbies.write().await;
    let lobby = lobbies.get_mut(&session.lobby_id)?;
    require_host!(lobby, session, "change the video");

    tracing::info!(lobby = %session.lobby_id, url = %url, "Video changed");
    let now = now_millis();
    lobby.set_url(url, subsurl, now);
    broadcast::send_to_all(lobby, |l, _| Some(broadcast::video_message(l, now, false)));
    None
}

pub async fn handle_elevate(
    state: &Arc<AppState>,
    session: &Session,
    code: String,
) -> Option<ServerMessage> {
    {
        let mut lobbies = state.lobbies.write().await;
        let lobby = lobbies.get_mut(&session.lobby_id)?;
        require_host!(lobby, session, "elevate");

        tracing::info!(lobby = %session.lobby_id, "Elevated access key changed");
        lobby.elevated_access_key = code;
    }

    state.send_elevated(&session.lobby_id, None).await;
    None
}

pub async fn handle_toggle_override(
    state: &Arc<AppState>,
    session: &Session,
    key: String,
) -> Option<ServerMessage> {
    let mut lobbies = state.lobbies.write().await;
    let lobby = lobbies.get_mut(&session.lobby_id)?;

    match lobby.toggle_override(&session.connection_id, &key) {
        Ok(active) => {
            tracing::info!(lobby = %session.lobby_id, active, "Override toggled");
            broadcast::send_to_all(lobby, connections_message);
            broadcast::send_to_all(lobby, |l, _| Some(broadcast::sap_message(l)));
        }
        Err(e) => {
            tracing::warn!(
                lobby = %session.lobby_id,
                connection = %session.connection_id,
                "Override toggle ignored: {}",
                e
            );
        }
    }
    None
}

pub async fn handle_transfer_host(
    state: &Arc<AppState>,
    session: &Session,
    target: ConnectionId,
) -> Option<ServerMessage> {
    let mut lobbies = state.lobbies.write().await;
    let lobby = lobbies.get_mut(&session.lobby_id)?;

    match lobby.transfer_host(&session.connection_id, &target) {
        Ok(()) => {
            tracing::info!(lobby = %session.lobby_id, host = %target, "Host transferred");
            broadcast::send_to_all(lobby, connections_message);
        }
        Err(e) => {
            tracing::warn!(
                lobby = %session.lobby_id,
                connection = %session.connection_id,
                "Host transfer rejected: {}",
                e
            );
        }
    }
    None
}

/// Only the host can see control assignment, so only the host gets the refreshed list
pub async fn handle_mpv_control(
    state: &Arc<AppState>,
    session: &Session,
    target: ConnectionId,
) -> Option<ServerMessage> {
    let mut lobbies = state.lobbies.write().await;
    let lobby = lobbies.get_mut(&session.lobby_id)?;

    match lobby.toggle_mpv_control(&session.connection_id, &target) {
        Ok(granted) => {
            tracing::info!(lobby = %session.lobby_id, target = %target, granted, "mpv control toggled");
            connections_message(lobby, &session.connection_id)
        }
        Err(e) => {
            tracing::warn!(
                lobby = %session.lobby_id,
                connection = %session.connection_id,
                "mpv control change rejected: {}",
                e
            );
            None
        }
    }
}

pub async fn handle_mpv_command(
    state: &Arc<AppState>,
    session: &Session,
    command: MpvCommand,
) -> Option<ServerMessage> {
    let lobbies = state.lobbies.read().await;
    let lobby = lobbies.get(&session.lobby_id)?;
    require_host!(lobby, session, "send mpv commands");

    if command == MpvCommand::Unknown {
        tracing::warn!(connection = %session.connection_id, "Invalid mpv command sent");
        return None;
    }
    broadcast::send_to_all(lobby, |l, id| broadcast::mpv_message(l, id, command));
    None
}
