use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Frames sent by clients after the socket is established
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Ping,
    Play {
        play: bool,
        /// Position to resync to along with the play/pause flip
        #[serde(default)]
        time: Option<f64>,
    },
    Time {
        time: f64,
    },
    Url {
        url: String,
        #[serde(default)]
        subsurl: String,
    },
    Elevate {
        code: String,
    },
    /// Toggle the host override lock
    Sap {
        #[serde(default)]
        key: String,
    },
    Getvideo,
    Message {
        message: String,
    },
    Name {
        name: String,
    },
    Host {
        connectionid: ConnectionId,
    },
    Mpvctrl {
        connectionid: ConnectionId,
    },
    Mpv {
        command: MpvCommand,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Pong,
    /// Lobby id did not resolve, the socket is closed right after
    Invalid,
    Connections {
        /// Whether the receiving connection is host
        host: bool,
        /// The receiving connection's own id
        connectionid: ConnectionId,
        connections: BTreeMap<ConnectionId, ConnectionInfo>,
    },
    Video {
        video: VideoState,
    },
    Elevated {
        elevated: bool,
    },
    Sap {
        sap: bool,
    },
    Message {
        from: String,
        message: String,
    },
    Mpv {
        command: MpvCommand,
    },
}
