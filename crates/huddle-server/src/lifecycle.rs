//! Connection lifecycle: `Connecting -> Connected -> Disconnected`.
//!
//! Presence is only reconciled against sessions registered on this process.
//! A friend connected to another relay process is reported `offline` at
//! connect time, and nothing is broadcast across processes on disconnect.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use huddle_shared::{ServerEvent, UserId};
use huddle_store::RelationStore;

use crate::error::RelayError;
use crate::registry::{ConnectionHandle, SessionRegistry};

/// A connected client: its handle plus the friend list read at connect time.
#[derive(Debug, Clone)]
pub struct Session {
    handle: ConnectionHandle,
    friends: Vec<UserId>,
}

impl Session {
    pub fn id(&self) -> &UserId {
        self.handle.session_id()
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    pub fn friends(&self) -> &[UserId] {
        &self.friends
    }
}

/// The handshake token is used as the session id as-is; validating it is the
/// token service's job.
pub fn session_id_from_token(token: Option<&str>) -> Result<UserId, RelayError> {
    match token {
        Some(token) if !token.trim().is_empty() => Ok(UserId::from(token)),
        _ => Err(RelayError::MissingToken),
    }
}

#[derive(Clone)]
pub struct ConnectionManager {
    registry: SessionRegistry,
    store: Arc<dyn RelationStore>,
    outbound_buffer: usize,
}

impl ConnectionManager {
    pub fn new(
        registry: SessionRegistry,
        store: Arc<dyn RelationStore>,
        outbound_buffer: usize,
    ) -> Self {
        Self {
            registry,
            store,
            outbound_buffer,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Register a new connection and exchange presence with friends
    /// connected to this process.
    ///
    /// Returns the session and the receiver of its outbound notifications.
    pub async fn connect(
        &self,
        token: Option<&str>,
    ) -> Result<(Session, mpsc::Receiver<ServerEvent>), RelayError> {
        let session_id = session_id_from_token(token)?;
        let (handle, rx) = ConnectionHandle::new(session_id.clone(), self.outbound_buffer);
        let connection_id = handle.connection_id();

        self.registry.register(handle.clone()).await;

        let friends = match self.store.friends(&session_id).await {
            Ok(friends) => friends,
            Err(e) => {
                self.registry
                    .deregister_connection(&session_id, connection_id)
                    .await;
                return Err(e.into());
            }
        };

        let mut online = 0usize;
        for friend in &friends {
            match self.registry.lookup(friend).await {
                Some(friend_handle) => {
                    friend_handle.send(ServerEvent::Online(session_id.clone()));
                    handle.send(ServerEvent::Online(friend.clone()));
                    online += 1;
                }
                None => {
                    handle.send(ServerEvent::Offline(friend.clone()));
                }
            }
        }

        info!(
            session = %session_id,
            connection = %connection_id,
            friends = friends.len(),
            online,
            "Client connected"
        );

        Ok((Session { handle, friends }, rx))
    }

    /// Deregister the session and tell friends still connected here that it
    /// went offline. Uses the friend list captured at connect time.
    ///
    /// A connection already replaced by a newer one for the same session
    /// leaves presence untouched.
    pub async fn disconnect(&self, session: Session) {
        let session_id = session.id().clone();
        let connection_id = session.handle.connection_id();

        if !self
            .registry
            .deregister_connection(&session_id, connection_id)
            .await
        {
            debug!(
                session = %session_id,
                connection = %connection_id,
                "Superseded connection closed, session still online"
            );
            return;
        }

        // The departing connection is closed, so nothing is sent back to it.
        let mut notified = 0usize;
        for friend in &session.friends {
            if self
                .registry
                .send_to(friend, ServerEvent::Offline(session_id.clone()))
                .await
            {
                notified += 1;
            }
        }

        let connected_secs = (Utc::now() - session.handle.connected_at()).num_seconds();
        info!(
            session = %session_id,
            connection = %connection_id,
            notified,
            connected_secs,
            "Client disconnected"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_store::MemoryStore;

    fn manager(store: &MemoryStore) -> ConnectionManager {
        ConnectionManager::new(SessionRegistry::new(), Arc::new(store.clone()), 16)
    }

    #[test]
    fn test_token_extraction() {
        assert_eq!(session_id_from_token(Some("abc")).unwrap(), UserId::from("abc"));
        assert!(matches!(session_id_from_token(None), Err(RelayError::MissingToken)));
        assert!(matches!(session_id_from_token(Some("  ")), Err(RelayError::MissingToken)));
        assert_eq!(session_id_from_token(Some(" abc")).unwrap(), UserId::from(" abc"));
    }

    #[tokio::test]
    async fn test_connect_disconnect_without_friends() {
        let store = MemoryStore::new();
        let manager = manager(&store);

        let (session, mut rx) = manager.connect(Some("alice")).await.unwrap();
        assert!(manager.registry().contains(session.id()).await);
        assert!(session.friends().is_empty());

        manager.disconnect(session).await;
        assert!(manager.registry().is_empty().await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_presence_exchange_with_local_friend() {
        let store = MemoryStore::new();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let carol = UserId::from("carol");
        store.befriend(&alice, &bob).await;
        store.befriend(&alice, &carol).await;
        let manager = manager(&store);

        let (bob_session, mut bob_rx) = manager.connect(Some("bob")).await.unwrap();
        // alice is not connected yet
        assert_eq!(bob_rx.try_recv().unwrap(), ServerEvent::Offline(alice.clone()));

        let (alice_session, mut alice_rx) = manager.connect(Some("alice")).await.unwrap();
        assert_eq!(bob_rx.try_recv().unwrap(), ServerEvent::Online(alice.clone()));

        assert_eq!(alice_rx.try_recv().unwrap(), ServerEvent::Online(bob.clone()));
        assert_eq!(alice_rx.try_recv().unwrap(), ServerEvent::Offline(carol.clone()));
        assert!(alice_rx.try_recv().is_err());

        manager.disconnect(alice_session).await;
        assert_eq!(bob_rx.try_recv().unwrap(), ServerEvent::Offline(alice.clone()));
        assert!(bob_rx.try_recv().is_err());

        manager.disconnect(bob_session).await;
        assert!(manager.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_disconnect_uses_friends_from_connect_time() {
        let store = MemoryStore::new();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let manager = manager(&store);

        let (alice_session, _alice_rx) = manager.connect(Some("alice")).await.unwrap();
        let (_bob_session, mut bob_rx) = manager.connect(Some("bob")).await.unwrap();

        // Friendship created after alice connected
        store.befriend(&alice, &bob).await;

        manager.disconnect(alice_session).await;
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reconnect_keeps_newest_session() {
        let store = MemoryStore::new();
        let manager = manager(&store);

        let (old, _old_rx) = manager.connect(Some("alice")).await.unwrap();
        let (new, _new_rx) = manager.connect(Some("alice")).await.unwrap();

        manager.disconnect(old).await;
        let current = manager.registry().lookup(new.id()).await.unwrap();
        assert_eq!(current.connection_id(), new.handle().connection_id());
    }

    #[tokio::test]
    async fn test_superseded_disconnect_keeps_presence() {
        let store = MemoryStore::new();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        store.befriend(&alice, &bob).await;
        let manager = manager(&store);

        let (_bob_session, mut bob_rx) = manager.connect(Some("bob")).await.unwrap();
        let (old, _old_rx) = manager.connect(Some("alice")).await.unwrap();
        let (_new, _new_rx) = manager.connect(Some("alice")).await.unwrap();
        while bob_rx.try_recv().is_ok() {}

        manager.disconnect(old).await;
        assert!(manager.registry().contains(&alice).await);
        assert!(bob_rx.try_recv().is_err());
    }
}
