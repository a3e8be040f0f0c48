//! WebSocket message dispatch
//!
//! Maps each inbound frame to its handler. Host-only handlers check the sender's
//! host flag under the same lock they mutate with; refusals are logged, never
//! reported to the client.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use std::sync::Arc;

use super::{host, participant, Session};

/// Handle a client message, returning an optional direct reply to the sender
pub async fn handle_message(
    msg: ClientMessage,
    session: &Session,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Ping => Some(ServerMessage::Pong),

        // Participant messages
        ClientMessage::Getvideo => participant::handle_get_video(state, session).await,

        ClientMessage::Message { message } => {
            participant::handle_chat(state, session, message).await
        }

        ClientMessage::Name { name } => participant::handle_rename(state, session, name).await,

        // Host-only commands
        ClientMessage::Play { play, time } => host::handle_play(state, session, play, time).await,

        ClientMessage::Time { time } => host::handle_time(state, session, time).await,

        ClientMessage::Url { url, subsurl } => {
            host::handle_url(state, session, url, subsurl).await
        }

        ClientMessage::Elevate { code } => host::handle_elevate(state, session, code).await,

        ClientMessage::Sap { key } => host::handle_toggle_override(state, session, key).await,

        ClientMessage::Host { connectionid } => {
            host::handle_transfer_host(state, session, connectionid).await
        }

        ClientMessage::Mpvctrl { connectionid } => {
            host::handle_mpv_control(state, session, connectionid).await
        }

        ClientMessage::Mpv { command } => host::handle_mpv_command(state, session, command).await,

        ClientMessage::Unknown => {
            tracing::warn!(
                connection = %session.connection_id,
                "Invalid command sent"
            );
            None
        }
    }
}
