//! Process-local session registry.
//!
//! Maps a session id to the live connection that presented it. Owned by the
//! [`ConnectionManager`](crate::lifecycle::ConnectionManager), which is its
//! only writer; the relays get a clone and only read from it. Registering an
//! id that is already present replaces the previous handle.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use huddle_shared::{ServerEvent, UserId};

/// Sending side of one client connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    connection_id: Uuid,
    session_id: UserId,
    connected_at: DateTime<Utc>,
    tx: mpsc::Sender<ServerEvent>,
}

impl ConnectionHandle {
    /// Create a handle plus the receiver the transport drains.
    pub fn new(session_id: UserId, capacity: usize) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        let handle = Self {
            connection_id: Uuid::new_v4(),
            session_id,
            connected_at: Utc::now(),
            tx,
        };
        (handle, rx)
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    pub fn session_id(&self) -> &UserId {
        &self.session_id
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Queue a notification without waiting. Returns `false` when it was
    /// dropped because the queue is full or the connection is gone.
    pub fn send(&self, event: ServerEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(
                    session = %self.session_id,
                    connection = %self.connection_id,
                    "Dropping notification for slow connection"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(
                    session = %self.session_id,
                    connection = %self.connection_id,
                    "Dropping notification for closed connection"
                );
                false
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<UserId, ConnectionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle under its session id. Returns the handle it
    /// replaced, if any.
    pub async fn register(&self, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        let session_id = handle.session_id.clone();
        let connection_id = handle.connection_id;
        let mut sessions = self.sessions.write().await;
        let replaced = sessions.insert(session_id.clone(), handle);

        info!(
            session = %session_id,
            connection = %connection_id,
            replaced = replaced.is_some(),
            sessions = sessions.len(),
            "Session registered"
        );

        replaced
    }

    /// Remove whatever handle is registered under `session_id`.
    pub async fn deregister(&self, session_id: &UserId) -> Option<ConnectionHandle> {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(session_id);
        if removed.is_some() {
            info!(session = %session_id, sessions = sessions.len(), "Session deregistered");
        }
        removed
    }

    /// Remove the entry only if it still belongs to `connection_id`, so a
    /// superseded connection closing does not evict its replacement.
    pub async fn deregister_connection(&self, session_id: &UserId, connection_id: Uuid) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(session_id) {
            Some(current) if current.connection_id == connection_id => {
                sessions.remove(session_id);
                info!(
                    session = %session_id,
                    connection = %connection_id,
                    sessions = sessions.len(),
                    "Session deregistered"
                );
                true
            }
            Some(_) => {
                debug!(
                    session = %session_id,
                    connection = %connection_id,
                    "Connection already superseded, keeping newer session"
                );
                false
            }
            None => false,
        }
    }

    pub async fn lookup(&self, session_id: &UserId) -> Option<ConnectionHandle> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn contains(&self, session_id: &UserId) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    /// Send to the connection registered under `session_id`. Returns
    /// `false` when no such session is registered here or the send dropped.
    pub async fn send_to(&self, session_id: &UserId, event: ServerEvent) -> bool {
        match self.lookup(session_id).await {
            Some(handle) => handle.send(event),
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn session_ids(&self) -> Vec<UserId> {
        self.sessions.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_lookup_deregister() {
        let registry = SessionRegistry::new();
        let alice = UserId::from("alice");
        let (handle, _rx) = ConnectionHandle::new(alice.clone(), 8);

        assert!(!registry.contains(&alice).await);
        assert!(registry.register(handle.clone()).await.is_none());
        assert!(registry.contains(&alice).await);
        assert_eq!(
            registry.lookup(&alice).await.unwrap().connection_id(),
            handle.connection_id()
        );
        assert_eq!(registry.session_ids().await, vec![alice.clone()]);

        assert!(registry.deregister(&alice).await.is_some());
        assert!(registry.is_empty().await);
        assert!(registry.lookup(&alice).await.is_none());
    }

    #[tokio::test]
    async fn test_last_connection_wins() {
        let registry = SessionRegistry::new();
        let alice = UserId::from("alice");
        let (first, mut first_rx) = ConnectionHandle::new(alice.clone(), 8);
        let (second, mut second_rx) = ConnectionHandle::new(alice.clone(), 8);

        registry.register(first.clone()).await;
        let replaced = registry.register(second.clone()).await.unwrap();
        assert_eq!(replaced.connection_id(), first.connection_id());
        assert_eq!(registry.len().await, 1);

        assert!(registry.send_to(&alice, ServerEvent::Online(UserId::from("bob"))).await);
        assert!(first_rx.try_recv().is_err());
        assert_eq!(
            second_rx.try_recv().unwrap(),
            ServerEvent::Online(UserId::from("bob"))
        );
    }

    #[tokio::test]
    async fn test_superseded_connection_does_not_evict() {
        let registry = SessionRegistry::new();
        let alice = UserId::from("alice");
        let (first, _first_rx) = ConnectionHandle::new(alice.clone(), 8);
        let (second, _second_rx) = ConnectionHandle::new(alice.clone(), 8);

        registry.register(first.clone()).await;
        registry.register(second.clone()).await;

        assert!(!registry.deregister_connection(&alice, first.connection_id()).await);
        assert!(registry.contains(&alice).await);

        assert!(registry.deregister_connection(&alice, second.connection_id()).await);
        assert!(!registry.contains(&alice).await);
    }

    #[tokio::test]
    async fn test_full_queue_drops() {
        let (handle, mut rx) = ConnectionHandle::new(UserId::from("alice"), 1);

        assert!(handle.send(ServerEvent::Online(UserId::from("a"))));
        assert!(!handle.send(ServerEvent::Online(UserId::from("b"))));
        assert_eq!(rx.try_recv().unwrap(), ServerEvent::Online(UserId::from("a")));

        drop(rx);
        assert!(!handle.send(ServerEvent::Offline(UserId::from("a"))));
    }

    #[tokio::test]
    async fn test_send_to_unknown_session() {
        let registry = SessionRegistry::new();
        assert!(!registry.send_to(&UserId::from("ghost"), ServerEvent::FriendAdd(None)).await);
    }
}
