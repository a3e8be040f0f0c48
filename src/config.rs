//! Process configuration loaded from environment variables

use std::path::PathBuf;
use std::time::Duration;

/// What to do when a socket names a lobby that does not exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownLobbyPolicy {
    /// Send `invalid` and close the socket
    Reject,
    /// Create the lobby on the fly
    Create,
}

impl UnknownLobbyPolicy {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "reject" => Some(Self::Reject),
            "create" => Some(Self::Create),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// How long an empty lobby survives before removal
    pub lobby_grace: Duration,
    pub unknown_lobby: UnknownLobbyPolicy,
    pub access_file: PathBuf,
    pub public_dir: PathBuf,
    pub private_dir: PathBuf,
    pub frontend_dir: PathBuf,
    pub home_page: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3434,
            lobby_grace: Duration::from_secs(5),
            unknown_lobby: UnknownLobbyPolicy::Reject,
            access_file: PathBuf::from("access.json"),
            public_dir: PathBuf::from("public"),
            private_dir: PathBuf::from("private"),
            frontend_dir: PathBuf::from("frontend"),
            home_page: PathBuf::from("page/home.html"),
        }
    }
}

impl Config {
    /// Load config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("WATCHSYNC_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);

        let lobby_grace = std::env::var("WATCHSYNC_LOBBY_GRACE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.lobby_grace);

        let unknown_lobby = match std::env::var("WATCHSYNC_UNKNOWN_LOBBY") {
            Ok(v) => UnknownLobbyPolicy::parse(&v).unwrap_or_else(|| {
                tracing::warn!(
                    value = %v,
                    "WATCHSYNC_UNKNOWN_LOBBY must be 'reject' or 'create', using 'reject'"
                );
                UnknownLobbyPolicy::Reject
            }),
            Err(_) => defaults.unknown_lobby,
        };

        let path_var = |name: &str, default: PathBuf| {
            std::env::var(name)
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or(default)
        };

        let config = Self {
            port,
            lobby_grace,
            unknown_lobby,
            access_file: path_var("WATCHSYNC_ACCESS_FILE", defaults.access_file),
            public_dir: path_var("WATCHSYNC_PUBLIC_DIR", defaults.public_dir),
            private_dir: path_var("WATCHSYNC_PRIVATE_DIR", defaults.private_dir),
            frontend_dir: path_var("WATCHSYNC_FRONTEND_DIR", defaults.frontend_dir),
            home_page: path_var("WATCHSYNC_HOME_PAGE", defaults.home_page),
        };

        tracing::info!(
            port = config.port,
            grace_secs = config.lobby_grace.as_secs(),
            unknown_lobby = ?config.unknown_lobby,
            access_file = %config.access_file.display(),
            "Config loaded"
        );

        config
    }
}
