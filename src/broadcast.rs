//! Per-connection message builders and lobby fan-out
//!
//! Builders are plain functions of `(lobby, target)` so one fan-out routine can
//! deliver any of them. Delivery is best effort: a closed socket is skipped and
//! the next broadcast re-synchronizes it.

use crate::protocol::ServerMessage;
use crate::types::{ConnectionId, ConnectionInfo, Lobby, MpvCommand};
use std::collections::BTreeMap;

pub const MAX_CHAT_CHARS: usize = 300;
pub const MAX_CHAT_WORD_CHARS: usize = 30;

/// Apply `build` to every connection in the lobby and send what it produces
pub fn send_to_all<F>(lobby: &Lobby, build: F)
where
    F: Fn(&Lobby, &ConnectionId) -> Option<ServerMessage>,
{
    for (id, connection) in &lobby.connections {
        if let Some(msg) = build(lobby, id) {
            connection.send(msg);
        }
    }
}

/// Participant list as seen by `target`.
/// Control assignment is only visible to the host.
pub fn connections_message(lobby: &Lobby, target: &ConnectionId) -> Option<ServerMessage> {
    let viewer = lobby.connections.get(target)?;
    let connections: BTreeMap<_, _> = lobby
        .connections
        .iter()
        .map(|(id, c)| {
            (
                id.clone(),
                ConnectionInfo {
                    username: c.username.clone(),
                    ready: c.ready,
                    bypass: c.bypass,
                    host: c.is_host,
                    mpv: c.is_mpv_client,
                    mpvctrl: viewer.is_host && c.has_mpv_control,
                },
            )
        })
        .collect();

    Some(ServerMessage::Connections {
        host: viewer.is_host,
        connectionid: target.clone(),
        connections,
    })
}

pub fn video_message(lobby: &Lobby, now_ms: i64, request_fresh: bool) -> ServerMessage {
    ServerMessage::Video {
        video: lobby.video_state(now_ms, request_fresh),
    }
}

pub fn sap_message(lobby: &Lobby) -> ServerMessage {
    ServerMessage::Sap {
        sap: lobby.override_key.is_some(),
    }
}

/// Chat line attributed to the sender's current username
pub fn chat_message(lobby: &Lobby, from: &ConnectionId, message: &str) -> Option<ServerMessage> {
    let sender = lobby.connections.get(from)?;
    Some(ServerMessage::Message {
        from: sender.username.clone(),
        message: message.to_string(),
    })
}

/// Remote command, only for mpv clients currently holding control
pub fn mpv_message(lobby: &Lobby, target: &ConnectionId, command: MpvCommand) -> Option<ServerMessage> {
    lobby
        .connections
        .get(target)
        .filter(|c| c.is_mpv_client && c.has_mpv_control)
        .map(|_| ServerMessage::Mpv { command })
}

/// Chat must fit in 300 characters with no word over 30
pub fn is_acceptable_chat(message: &str) -> bool {
    message.chars().count() <= MAX_CHAT_CHARS
        && message
            .split_whitespace()
            .all(|word| word.chars().count() <= MAX_CHAT_WORD_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Connection;
    use tokio::sync::mpsc;

    fn lobby_with(members: &[(&str, bool)]) -> (Lobby, Vec<mpsc::UnboundedReceiver<ServerMessage>>) {
        let mut lobby = Lobby::new(0);
        let mut receivers = Vec::new();
        for (id, mpv) in members {
            let (tx, rx) = mpsc::unbounded_channel();
            let order = lobby.next_order_number();
            lobby
                .connections
                .insert(id.to_string(), Connection::new(id, order, *mpv, tx));
            receivers.push(rx);
        }
        lobby.elect_host(None);
        (lobby, receivers)
    }

    #[test]
    fn test_mpvctrl_masked_for_non_host() {
        let (mut lobby, _rx) = lobby_with(&[("H", false), ("V", false), ("M", true)]);
        lobby.toggle_mpv_control("H", "M").unwrap();

        let Some(ServerMessage::Connections {
            host, connections, ..
        }) = connections_message(&lobby, &"H".to_string())
        else {
            panic!("Expected Connections message");
        };
        assert!(host);
        assert!(connections["M"].mpvctrl);

        let Some(ServerMessage::Connections {
            host,
            connectionid,
            connections,
        }) = connections_message(&lobby, &"V".to_string())
        else {
            panic!("Expected Connections message");
        };
        assert!(!host);
        assert_eq!(connectionid, "V");
        assert!(connections.values().all(|c| !c.mpvctrl));
        assert!(connections["H"].host);
        assert!(connections["M"].mpv);
    }

    #[test]
    fn test_send_to_all_skips_closed_sockets() {
        let (lobby, mut receivers) = lobby_with(&[("A", false), ("B", false)]);
        drop(receivers.remove(0));

        send_to_all(&lobby, |l, _| Some(sap_message(l)));
        assert_eq!(
            receivers[0].try_recv().unwrap(),
            ServerMessage::Sap { sap: false }
        );
    }

    #[test]
    fn test_mpv_message_targets_controllers_only() {
        let (mut lobby, mut receivers) = lobby_with(&[("H", false), ("M1", true), ("M2", true)]);
        lobby.toggle_mpv_control("H", "M2").unwrap();

        send_to_all(&lobby, |l, id| mpv_message(l, id, MpvCommand::Volup));
        assert!(receivers[0].try_recv().is_err());
        assert!(receivers[1].try_recv().is_err());
        assert_eq!(
            receivers[2].try_recv().unwrap(),
            ServerMessage::Mpv {
                command: MpvCommand::Volup
            }
        );
    }

    #[test]
    fn test_chat_limits() {
        let words_300: String = std::iter::repeat("abcd ").take(60).collect();
        assert_eq!(words_300.chars().count(), 300);
        assert!(is_acceptable_chat(&words_300));

        let words_301 = format!("{}x", words_300);
        assert!(!is_acceptable_chat(&words_301));

        assert!(is_acceptable_chat(&"a".repeat(30)));
        assert!(!is_acceptable_chat(&format!("hi {}", "a".repeat(31))));

        // Characters, not bytes
        assert!(is_acceptable_chat(&"ü".repeat(30)));
    }

    #[test]
    fn test_chat_uses_current_username() {
        let (mut lobby, _rx) = lobby_with(&[("A", false)]);
        lobby.connections.get_mut("A").unwrap().username = "alice".to_string();
        assert_eq!(
            chat_message(&lobby, &"A".to_string(), "hello"),
            Some(ServerMessage::Message {
                from: "alice".to_string(),
                message: "hello".to_string()
            })
        );
    }
}
