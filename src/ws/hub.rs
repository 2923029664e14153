//! Addressable recipients: live connections and per-session fan-out lists

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::protocol::{PlayerInfo, ServerMsg};

/// A connected player as seen by the lobby and the match engine.
/// Cloning is cheap; all clones feed the same socket writer.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    /// Unique per socket
    pub conn_id: Uuid,
    /// Stable identity from the auth token
    pub user_id: Uuid,
    pub display_name: String,
    tx: mpsc::UnboundedSender<ServerMsg>,
}

impl PlayerHandle {
    /// Create a handle and the receiver its socket writer drains
    pub fn new(user_id: Uuid, display_name: String) -> (Self, mpsc::UnboundedReceiver<ServerMsg>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            conn_id: Uuid::new_v4(),
            user_id,
            display_name,
            tx,
        };
        (handle, rx)
    }

    /// Queue a message for this connection. Returns false once the socket is gone.
    pub fn send(&self, msg: ServerMsg) -> bool {
        if self.tx.send(msg).is_err() {
            debug!(conn_id = %self.conn_id, "Dropped message for closed connection");
            return false;
        }
        true
    }

    pub fn info(&self) -> PlayerInfo {
        PlayerInfo {
            user_id: self.user_id,
            display_name: self.display_name.clone(),
        }
    }
}

/// Every live connection, keyed by connection id
#[derive(Default)]
pub struct ConnectionHub {
    connections: DashMap<Uuid, PlayerHandle>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: PlayerHandle) {
        self.connections.insert(handle.conn_id, handle);
    }

    pub fn unregister(&self, conn_id: &Uuid) -> Option<PlayerHandle> {
        self.connections.remove(conn_id).map(|(_, h)| h)
    }

    /// All connections a user currently has open
    pub fn connections_of(&self, user_id: Uuid) -> Vec<PlayerHandle> {
        self.connections
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Send to every connection of a user; returns how many were reached
    pub fn send_to_user(&self, user_id: Uuid, msg: &ServerMsg) -> usize {
        self.connections_of(user_id)
            .into_iter()
            .filter(|handle| handle.send(msg.clone()))
            .count()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }
}

/// The current member list of one session. Shared between the session,
/// which edits it, and the match task, which only sends through it.
#[derive(Clone, Default)]
pub struct Recipients {
    members: Arc<RwLock<Vec<PlayerHandle>>>,
}

impl Recipients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, handle: PlayerHandle) {
        let mut members = self.members.write();
        if !members.iter().any(|m| m.conn_id == handle.conn_id) {
            members.push(handle);
        }
    }

    pub fn remove(&self, conn_id: Uuid) {
        self.members.write().retain(|m| m.conn_id != conn_id);
    }

    pub fn send(&self, msg: &ServerMsg) {
        for member in self.members.read().iter() {
            member.send(msg.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_to_user_reaches_every_connection() {
        let hub = ConnectionHub::new();
        let user_id = Uuid::new_v4();
        let (first, mut first_rx) = PlayerHandle::new(user_id, "ann".to_string());
        let (second, mut second_rx) = PlayerHandle::new(user_id, "ann".to_string());
        let (other, mut other_rx) = PlayerHandle::new(Uuid::new_v4(), "bob".to_string());
        hub.register(first);
        hub.register(second);
        hub.register(other);

        let sent = hub.send_to_user(user_id, &ServerMsg::Message { text: "hi".to_string() });
        assert_eq!(sent, 2);
        assert!(first_rx.try_recv().is_ok());
        assert!(second_rx.try_recv().is_ok());
        assert!(other_rx.try_recv().is_err());
    }

    #[test]
    fn test_recipients_dedup_and_remove() {
        let recipients = Recipients::new();
        let (player, mut rx) = PlayerHandle::new(Uuid::new_v4(), "ann".to_string());
        recipients.add(player.clone());
        recipients.add(player.clone());

        recipients.send(&ServerMsg::Countdown { seconds: 1 });
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());

        recipients.remove(player.conn_id);
        recipients.send(&ServerMsg::Countdown { seconds: 0 });
        assert!(rx.try_recv().is_err());
    }
}
