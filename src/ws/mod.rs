pub mod handlers;
mod host;
mod participant;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::{ConnectionId, LobbyId};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Lobby to join
    pub id: Option<String>,
    /// "true" for mpv clients
    pub mpv: Option<String>,
    /// Override key presented on join
    pub sap: Option<String>,
}

/// Identity of the socket a message arrived on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub lobby_id: LobbyId,
    pub connection_id: ConnectionId,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!(
        lobby = ?params.id,
        mpv = ?params.mpv,
        "WebSocket connection request"
    );

    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

async fn send_json(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize message: {}", e);
            true
        }
    }
}

/// Parse and dispatch one inbound text frame.
///
/// Frames that fail to parse are dropped without a reply and never end the socket.
pub async fn handle_text_frame(
    text: &str,
    session: &Session,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    tracing::debug!(connection = %session.connection_id, "Received message: {}", text);

    match serde_json::from_str::<ClientMessage>(text) {
        Ok(client_msg) => handlers::handle_message(client_msg, session, state).await,
        Err(e) => {
            tracing::warn!(
                connection = %session.connection_id,
                "Discarding unparseable message: {}", e
            );
            None
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, params: WsQuery, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let lobby_id = params.id.unwrap_or_default();
    let is_mpv_client = params.mpv.as_deref() == Some("true");
    let override_key = params.sap.as_deref().filter(|k| !k.is_empty());

    let connection_id = match state
        .admit(&lobby_id, is_mpv_client, override_key, tx)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("Rejecting connection: {}", e);
            send_json(&mut sender, &ServerMessage::Invalid).await;
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    let session = Session {
        lobby_id,
        connection_id,
    };

    loop {
        tokio::select! {
            // Lobby fan-out addressed to this connection
            outbound = rx.recv() => {
                match outbound {
                    Some(msg) => {
                        if !send_json(&mut sender, &msg).await {
                            break;
                        }
                    }
                    None => break,
                }
            }

            // Handle client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(response) = handle_text_frame(text.as_str(), &session, &state).await {
                            if !send_json(&mut sender, &response).await {
                                tracing::error!("Failed to send response");
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    if let Err(e) = state
        .remove_connection(&session.lobby_id, &session.connection_id)
        .await
    {
        tracing::warn!("Failed to remove connection: {}", e);
    }
}
