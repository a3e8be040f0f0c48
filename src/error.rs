use crate::types::{ConnectionId, LobbyId};

/// Errors raised by registry operations
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    #[error("Lobby not found: {0}")]
    UnknownLobby(LobbyId),

    #[error("Connection {connection} not found in lobby {lobby}")]
    UnknownConnection {
        lobby: LobbyId,
        connection: ConnectionId,
    },
}

/// Errors raised while reading access data
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("Failed to read access data: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed access data: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Reasons a host-level action on a lobby was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostActionError {
    #[error("Only the host can do this")]
    NotHost,

    #[error("Host cannot transfer to itself")]
    SelfTransfer,

    #[error("Target connection not found: {0}")]
    UnknownTarget(ConnectionId),

    #[error("Host is locked while an override key is set")]
    OverrideLocked,

    #[error("Override key must not be empty")]
    EmptyOverrideKey,

    #[error("Override key does not match")]
    OverrideKeyMismatch,

    #[error("Target is not an mpv client: {0}")]
    NotMpvClient(ConnectionId),
}
