use crate::protocol::ServerMessage;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Opaque ID types for type safety
pub type LobbyId = String;
pub type ConnectionId = String;

/// Outbound channel to a connection's socket task
pub type ConnectionSender = mpsc::UnboundedSender<ServerMessage>;

/// Generate a 16 character uppercase hex id (used for lobbies and connections)
pub fn generate_hex_id() -> String {
    let mut bytes = [0u8; 8];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode_upper(bytes)
}

/// Milliseconds since the unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A participant in a lobby
#[derive(Debug)]
pub struct Connection {
    pub username: String,
    /// Election priority key, lower wins. Never reused within a lobby.
    pub order_number: i64,
    pub is_host: bool,
    pub is_mpv_client: bool,
    pub has_mpv_control: bool,
    pub ready: bool,
    pub bypass: bool,
    pub sender: ConnectionSender,
}

impl Connection {
    pub fn new(id: &str, order_number: i64, is_mpv_client: bool, sender: ConnectionSender) -> Self {
        Self {
            username: id.to_string(),
            order_number,
            is_host: false,
            is_mpv_client,
            has_mpv_control: false,
            ready: false,
            bypass: false,
            sender,
        }
    }

    /// Best-effort delivery, a closed socket is skipped
    pub fn send(&self, msg: ServerMessage) {
        let _ = self.sender.send(msg);
    }
}

/// A room of connections sharing one playback state
#[derive(Debug)]
pub struct Lobby {
    pub connections: HashMap<ConnectionId, Connection>,
    pub media_url: String,
    pub subtitle_url: String,
    pub playing: bool,
    /// Playback position in seconds as of `last_update`
    pub reference_time: f64,
    /// Milliseconds since epoch
    pub last_update: i64,
    pub elevated_access_key: String,
    pub override_key: Option<String>,
    pub expiry: Option<JoinHandle<()>>,
}

impl Lobby {
    pub fn new(now_ms: i64) -> Self {
        Self {
            connections: HashMap::new(),
            media_url: String::new(),
            subtitle_url: String::new(),
            playing: false,
            reference_time: 0.0,
            last_update: now_ms,
            elevated_access_key: String::new(),
            override_key: None,
            expiry: None,
        }
    }

    pub fn is_host(&self, connection_id: &str) -> bool {
        self.connections
            .get(connection_id)
            .is_some_and(|c| c.is_host)
    }

    pub fn host_id(&self) -> Option<&ConnectionId> {
        self.connections
            .iter()
            .find(|(_, c)| c.is_host)
            .map(|(id, _)| id)
    }

    pub fn next_order_number(&self) -> i64 {
        self.connections
            .values()
            .map(|c| c.order_number)
            .max()
            .unwrap_or(0)
            + 1
    }

    pub fn min_order_number(&self) -> Option<i64> {
        self.connections.values().map(|c| c.order_number).min()
    }

    pub fn cancel_expiry(&mut self) {
        if let Some(handle) = self.expiry.take() {
            handle.abort();
        }
    }
}

impl Drop for Lobby {
    fn drop(&mut self) {
        self.cancel_expiry();
    }
}

/// Playback snapshot as sent to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoState {
    pub url: String,
    pub subsurl: String,
    pub play: bool,
    pub time: f64,
}

/// One entry of the participant list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionInfo {
    pub username: String,
    pub ready: bool,
    pub bypass: bool,
    pub host: bool,
    pub mpv: bool,
    pub mpvctrl: bool,
}

/// Remote playback commands understood by mpv clients
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MpvCommand {
    Display,
    Subcycle,
    Audiocycle,
    Voldown,
    Volup,
    Subdelaydown,
    Subdelayup,
    Audiodelaydown,
    Audiodelayup,
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_hex_id() {
        let id = generate_hex_id();
        assert_eq!(id.len(), 16);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn test_mpv_command_unknown() {
        let cmd: MpvCommand = serde_json::from_str("\"volup\"").unwrap();
        assert_eq!(cmd, MpvCommand::Volup);
        let cmd: MpvCommand = serde_json::from_str("\"explode\"").unwrap();
        assert_eq!(cmd, MpvCommand::Unknown);
    }
}
