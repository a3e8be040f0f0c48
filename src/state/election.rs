//! Host election and host-level membership actions
//!
//! The host is the connection with the lowest order number, provided at least
//! one connection in the lobby is not an mpv client. While an override key is
//! set the host is locked: only a connection presenting the key can take it over.

use crate::error::HostActionError;
use crate::types::{ConnectionId, Lobby};

impl Lobby {
    /// Connection with the globally lowest order number, mpv clients included
    fn lowest_order(&self) -> Option<(ConnectionId, i64)> {
        self.connections
            .iter()
            .min_by(|a, b| {
                a.1.order_number
                    .cmp(&b.1.order_number)
                    .then_with(|| a.0.cmp(b.0))
            })
            .map(|(id, c)| (id.clone(), c.order_number))
    }

    /// Recompute `is_host` for every connection.
    ///
    /// `claim` is `(connection_id, key)` from the party acting right now (a joining
    /// socket or the host toggling the override). It only matters while an
    /// override key is set. Returns the new host, if any.
    pub fn elect_host(&mut self, claim: Option<(&str, &str)>) -> Option<ConnectionId> {
        let (min_id, min_order) = self.lowest_order()?;
        let has_eligible = self.connections.values().any(|c| !c.is_mpv_client);
        let former_host = self.host_id().cloned();

        for connection in self.connections.values_mut() {
            connection.is_host = false;
        }

        let new_host = match self.override_key.clone() {
            None => has_eligible.then_some(min_id),
            Some(override_key) => match claim {
                Some((claimant, key))
                    if key == override_key && self.connections.contains_key(claimant) =>
                {
                    if let Some(connection) = self.connections.get_mut(claimant) {
                        connection.order_number = min_order - 1;
                    }
                    Some(claimant.to_string())
                }
                // Locked: keep whoever held it, never hand over automatically
                _ => former_host.filter(|id| self.connections.contains_key(id)),
            },
        };

        if let Some(ref id) = new_host {
            if let Some(connection) = self.connections.get_mut(id) {
                connection.is_host = true;
            }
            tracing::debug!(host = %id, "Host elected");
        } else {
            tracing::debug!("Lobby has no host");
        }

        new_host
    }

    /// Hand the host role from `actor` to `target`
    pub fn transfer_host(&mut self, actor: &str, target: &str) -> Result<(), HostActionError> {
        if !self.is_host(actor) {
            return Err(HostActionError::NotHost);
        }
        if self.override_key.is_some() {
            return Err(HostActionError::OverrideLocked);
        }
        if actor == target {
            return Err(HostActionError::SelfTransfer);
        }
        let min_order = self.min_order_number().unwrap_or(0);
        let connection = self
            .connections
            .get_mut(target)
            .ok_or_else(|| HostActionError::UnknownTarget(target.to_string()))?;
        connection.order_number = min_order - 1;
        self.elect_host(None);
        Ok(())
    }

    /// Enable the override with `key`, or disable it when `key` matches the stored one.
    /// Returns whether an override is active afterwards.
    pub fn toggle_override(&mut self, actor: &str, key: &str) -> Result<bool, HostActionError> {
        if !self.is_host(actor) {
            return Err(HostActionError::NotHost);
        }
        match self.override_key.as_deref() {
            None => {
                if key.is_empty() {
                    return Err(HostActionError::EmptyOverrideKey);
                }
                self.override_key = Some(key.to_string());
            }
            Some(current) => {
                if current != key {
                    return Err(HostActionError::OverrideKeyMismatch);
                }
                self.override_key = None;
            }
        }
        self.elect_host(Some((actor, key)));
        Ok(self.override_key.is_some())
    }

    /// Toggle mpv remote control on `target`. Granting it revokes it everywhere else.
    /// Returns whether the target holds control afterwards.
    pub fn toggle_mpv_control(&mut self, actor: &str, target: &str) -> Result<bool, HostActionError> {
        if !self.is_host(actor) {
            return Err(HostActionError::NotHost);
        }
        let (is_mpv, has_control) = self
            .connections
            .get(target)
            .map(|c| (c.is_mpv_client, c.has_mpv_control))
            .ok_or_else(|| HostActionError::UnknownTarget(target.to_string()))?;
        if !is_mpv {
            return Err(HostActionError::NotMpvClient(target.to_string()));
        }

        if !has_control {
            for connection in self.connections.values_mut() {
                connection.has_mpv_control = false;
            }
        }
        if let Some(connection) = self.connections.get_mut(target) {
            connection.has_mpv_control = !has_control;
        }
        Ok(!has_control)
    }
}
