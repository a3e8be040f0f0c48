use super::AppState;
use crate::access;
use crate::broadcast::{self, connections_message};
use crate::config::UnknownLobbyPolicy;
use crate::error::LobbyError;
use crate::protocol::ServerMessage;
use crate::types::*;

impl AppState {
    /// Insert an empty lobby under `lobby_id`, replacing any existing one.
    /// No expiry is armed until the lobby first becomes empty.
    pub async fn create_lobby(&self, lobby_id: &str) {
        let mut lobbies = self.lobbies.write().await;
        lobbies.insert(lobby_id.to_string(), Lobby::new(now_millis()));
        tracing::info!(lobby = lobby_id, "Established a new lobby");
        tracing::info!("There are {} lobbies active", lobbies.len());
    }

    /// Create a lobby under a fresh id for the HTTP entry point.
    /// The expiry is armed right away so lobbies nobody joins are collected.
    pub async fn start_lobby(&self) -> LobbyId {
        let mut lobbies = self.lobbies.write().await;
        let lobby_id = loop {
            let id = generate_hex_id();
            if !lobbies.contains_key(&id) {
                break id;
            }
        };

        let mut lobby = Lobby::new(now_millis());
        self.schedule_expiry(&lobby_id, &mut lobby);
        lobbies.insert(lobby_id.clone(), lobby);

        tracing::info!(lobby = %lobby_id, "Established a new lobby");
        tracing::info!("There are {} lobbies active", lobbies.len());
        lobby_id
    }

    pub async fn has_lobby(&self, lobby_id: &str) -> bool {
        self.lobbies.read().await.contains_key(lobby_id)
    }

    pub async fn lobby_count(&self) -> usize {
        self.lobbies.read().await.len()
    }

    /// Elevated access key of a lobby, used to gate private files
    pub async fn elevated_key(&self, lobby_id: &str) -> Option<String> {
        self.lobbies
            .read()
            .await
            .get(lobby_id)
            .map(|l| l.elevated_access_key.clone())
            .filter(|k| !k.is_empty())
    }

    /// Cancel a pending expiry
    pub async fn touch(&self, lobby_id: &str) -> Result<(), LobbyError> {
        let mut lobbies = self.lobbies.write().await;
        let lobby = lobbies
            .get_mut(lobby_id)
            .ok_or_else(|| LobbyError::UnknownLobby(lobby_id.to_string()))?;
        lobby.cancel_expiry();
        Ok(())
    }

    /// (Re)start the grace window after which an empty lobby is removed
    pub async fn arm_expiry(&self, lobby_id: &str) -> Result<(), LobbyError> {
        let mut lobbies = self.lobbies.write().await;
        let lobby = lobbies
            .get_mut(lobby_id)
            .ok_or_else(|| LobbyError::UnknownLobby(lobby_id.to_string()))?;
        self.schedule_expiry(lobby_id, lobby);
        Ok(())
    }

    /// The removal re-checks emptiness when it fires rather than trusting the arm-time state
    fn schedule_expiry(&self, lobby_id: &str, lobby: &mut Lobby) {
        lobby.cancel_expiry();

        let lobbies = self.lobbies.clone();
        let grace = self.config.lobby_grace;
        let id = lobby_id.to_string();
        lobby.expiry = Some(tokio::spawn(async move {
            tokio::time::sleep(grace).await;

            let mut lobbies = lobbies.write().await;
            if lobbies.get(&id).is_some_and(|l| l.connections.is_empty()) {
                if let Some(mut lobby) = lobbies.remove(&id) {
                    // Detach our own handle so dropping the lobby does not abort us
                    lobby.expiry.take();
                }
                tracing::info!(lobby = %id, "Clearing inactive empty lobby");
                tracing::info!("There are {} lobbies active", lobbies.len());
            }
        }));
    }

    /// Admit a new connection into a lobby, elect a host and bring everyone up to date.
    ///
    /// `override_key` is the key presented by the joining socket, if any. Unknown
    /// lobbies are rejected or created according to the configured policy.
    pub async fn admit(
        &self,
        lobby_id: &str,
        is_mpv_client: bool,
        override_key: Option<&str>,
        sender: ConnectionSender,
    ) -> Result<ConnectionId, LobbyError> {
        let connection_id = {
            let mut lobbies = self.lobbies.write().await;

            if !lobbies.contains_key(lobby_id) {
                match self.config.unknown_lobby {
                    UnknownLobbyPolicy::Reject => {
                        return Err(LobbyError::UnknownLobby(lobby_id.to_string()));
                    }
                    UnknownLobbyPolicy::Create => {
                        lobbies.insert(lobby_id.to_string(), Lobby::new(now_millis()));
                        tracing::info!(lobby = lobby_id, "Auto-created lobby on connect");
                        tracing::info!("There are {} lobbies active", lobbies.len());
                    }
                }
            }
            let lobby = lobbies
                .get_mut(lobby_id)
                .ok_or_else(|| LobbyError::UnknownLobby(lobby_id.to_string()))?;

            let connection_id = loop {
                let id = generate_hex_id();
                if !lobby.connections.contains_key(&id) {
                    break id;
                }
            };

            lobby.cancel_expiry();
            let order_number = lobby.next_order_number();
            lobby.connections.insert(
                connection_id.clone(),
                Connection::new(&connection_id, order_number, is_mpv_client, sender),
            );

            tracing::info!(
                lobby = lobby_id,
                connection = %connection_id,
                mpv = is_mpv_client,
                "User has connected"
            );

            let claim = override_key.map(|key| (connection_id.as_str(), key));
            lobby.elect_host(claim);

            broadcast::send_to_all(lobby, connections_message);
            if let Some(connection) = lobby.connections.get(&connection_id) {
                connection.send(broadcast::video_message(lobby, now_millis(), false));
                connection.send(broadcast::sap_message(lobby));
            }

            connection_id
        };

        self.send_elevated(lobby_id, Some(&connection_id)).await;
        Ok(connection_id)
    }

    /// Tear down a connection after its socket closed
    pub async fn remove_connection(
        &self,
        lobby_id: &str,
        connection_id: &str,
    ) -> Result<(), LobbyError> {
        let mut lobbies = self.lobbies.write().await;
        let lobby = lobbies
            .get_mut(lobby_id)
            .ok_or_else(|| LobbyError::UnknownLobby(lobby_id.to_string()))?;
        let connection = lobby.connections.remove(connection_id).ok_or_else(|| {
            LobbyError::UnknownConnection {
                lobby: lobby_id.to_string(),
                connection: connection_id.to_string(),
            }
        })?;

        tracing::info!(
            lobby = lobby_id,
            connection = connection_id,
            username = %connection.username,
            "User has disconnected"
        );

        if lobby.connections.is_empty() {
            self.schedule_expiry(lobby_id, lobby);
        }
        lobby.elect_host(None);
        broadcast::send_to_all(lobby, connections_message);
        Ok(())
    }

    /// Send the lobby's elevated-access flag to one connection, or to all when `only` is None.
    ///
    /// The access lookup may suspend, so targets and key are captured first and the
    /// registry lock is not held across it.
    pub async fn send_elevated(&self, lobby_id: &str, only: Option<&str>) {
        let (key, targets) = {
            let lobbies = self.lobbies.read().await;
            let Some(lobby) = lobbies.get(lobby_id) else {
                return;
            };
            let targets: Vec<ConnectionSender> = lobby
                .connections
                .iter()
                .filter(|(id, _)| only.map_or(true, |o| o == id.as_str()))
                .map(|(_, c)| c.sender.clone())
                .collect();
            (lobby.elevated_access_key.clone(), targets)
        };

        let elevated = access::is_elevated(self.access.as_ref(), &key, now_millis()).await;
        for target in targets {
            let _ = target.send(ServerMessage::Elevated { elevated });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::MemoryAccessStore;
    use crate::config::Config;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn state_with_grace(grace: Duration, policy: UnknownLobbyPolicy) -> AppState {
        let config = Config {
            lobby_grace: grace,
            unknown_lobby: policy,
            ..Config::default()
        };
        AppState::new(config, Arc::new(MemoryAccessStore::new()))
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn test_create_lobby() {
        let state = AppState::default();
        state.create_lobby("L1").await;
        assert!(state.has_lobby("L1").await);
        assert_eq!(state.lobby_count().await, 1);

        let lobbies = state.lobbies.read().await;
        let lobby = &lobbies["L1"];
        assert!(lobby.connections.is_empty());
        assert!(lobby.override_key.is_none());
        assert!(lobby.expiry.is_none());
    }

    #[tokio::test]
    async fn test_start_lobby_issues_hex_ids() {
        let state = AppState::default();
        let a = state.start_lobby().await;
        let b = state.start_lobby().await;
        assert_ne!(a, b);
        assert_eq!(a.len(), 16);
        assert_eq!(state.lobby_count().await, 2);
    }

    #[tokio::test]
    async fn test_unknown_lobby_rejected() {
        let state = state_with_grace(Duration::from_secs(5), UnknownLobbyPolicy::Reject);
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = state.admit("NOPE", false, None, tx).await;
        assert!(matches!(result, Err(LobbyError::UnknownLobby(_))));
        assert!(!state.has_lobby("NOPE").await);
    }

    #[tokio::test]
    async fn test_unknown_lobby_created() {
        let state = state_with_grace(Duration::from_secs(5), UnknownLobbyPolicy::Create);
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = state.admit("NEW", false, None, tx).await.unwrap();
        let lobbies = state.lobbies.read().await;
        assert!(lobbies["NEW"].connections[&id].is_host);
    }

    #[tokio::test]
    async fn test_admit_sends_initial_state() {
        let state = AppState::default();
        state.create_lobby("L").await;

        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let a = state.admit("L", false, None, tx_a).await.unwrap();
        let msgs = drain(&mut rx_a);
        assert_eq!(msgs.len(), 4);
        assert!(matches!(
            &msgs[0],
            ServerMessage::Connections { host: true, connectionid, .. } if *connectionid == a
        ));
        assert!(matches!(msgs[1], ServerMessage::Video { .. }));
        assert_eq!(msgs[2], ServerMessage::Sap { sap: false });
        assert_eq!(msgs[3], ServerMessage::Elevated { elevated: false });

        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        state.admit("L", false, None, tx_b).await.unwrap();
        let msgs = drain(&mut rx_a);
        assert_eq!(msgs.len(), 1);
        assert!(matches!(
            &msgs[0],
            ServerMessage::Connections { host: true, connections, .. } if connections.len() == 2
        ));
        assert_eq!(drain(&mut rx_b).len(), 4);
    }

    #[tokio::test]
    async fn test_disconnect_recomputes_host() {
        let state = AppState::default();
        state.create_lobby("L").await;
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let a = state.admit("L", false, None, tx_a).await.unwrap();
        let b = state.admit("L", false, None, tx_b).await.unwrap();
        drain(&mut rx_b);

        state.remove_connection("L", &a).await.unwrap();
        let msgs = drain(&mut rx_b);
        assert!(matches!(
            &msgs[..],
            [ServerMessage::Connections { host: true, connectionid, .. }] if *connectionid == b
        ));

        assert!(matches!(
            state.remove_connection("L", &a).await,
            Err(LobbyError::UnknownConnection { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_lobby_expires_after_grace() {
        let state = state_with_grace(Duration::from_millis(50), UnknownLobbyPolicy::Reject);
        state.create_lobby("L").await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = state.admit("L", false, None, tx).await.unwrap();
        state.remove_connection("L", &id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(state.has_lobby("L").await);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!state.has_lobby("L").await);
    }

    #[tokio::test]
    async fn test_reconnect_within_grace_keeps_lobby() {
        let state = state_with_grace(Duration::from_millis(50), UnknownLobbyPolicy::Reject);
        state.create_lobby("L").await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = state.admit("L", false, None, tx).await.unwrap();
        {
            let mut lobbies = state.lobbies.write().await;
            lobbies.get_mut("L").unwrap().set_time(42.0, now_millis());
        }
        state.remove_connection("L", &id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let (tx, _rx) = mpsc::unbounded_channel();
        state.admit("L", false, None, tx).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let lobbies = state.lobbies.read().await;
        let lobby = lobbies.get("L").expect("lobby should survive");
        assert_eq!(lobby.reference_time, 42.0);
    }

    #[tokio::test]
    async fn test_rearm_restarts_grace_window() {
        let state = state_with_grace(Duration::from_millis(60), UnknownLobbyPolicy::Reject);
        state.create_lobby("L").await;
        state.arm_expiry("L").await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        state.arm_expiry("L").await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(state.has_lobby("L").await);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!state.has_lobby("L").await);
    }

    #[tokio::test]
    async fn test_touch_cancels_expiry() {
        let state = state_with_grace(Duration::from_millis(30), UnknownLobbyPolicy::Reject);
        state.create_lobby("L").await;
        state.arm_expiry("L").await.unwrap();
        state.touch("L").await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(state.has_lobby("L").await);
        assert!(matches!(
            state.touch("X").await,
            Err(LobbyError::UnknownLobby(_))
        ));
    }
}
