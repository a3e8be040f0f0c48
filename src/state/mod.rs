mod election;
mod lobby;
mod playback;

pub use playback::{RESYNC_LOOKAHEAD_SECS, RESYNC_MIN_POSITION_SECS};

use crate::access::{AccessStore, MemoryAccessStore};
use crate::config::Config;
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state: the lobby registry plus its collaborators.
/// Owned by the server and handed to every handler, tests build their own.
#[derive(Clone)]
pub struct AppState {
    pub lobbies: Arc<RwLock<HashMap<LobbyId, Lobby>>>,
    pub config: Arc<Config>,
    pub access: Arc<dyn AccessStore>,
}

impl AppState {
    pub fn new(config: Config, access: Arc<dyn AccessStore>) -> Self {
        Self {
            lobbies: Arc::new(RwLock::new(HashMap::new())),
            config: Arc::new(config),
            access,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Config::default(), Arc::new(MemoryAccessStore::new()))
    }
}
