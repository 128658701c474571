use std::sync::Arc;

use tracing::{debug, info};

use huddle_bus::{publish_event, FanoutBus};
use huddle_shared::{BusEvent, FriendAcceptEvent, ServerEvent, UserId};
use huddle_store::RelationStore;

use crate::error::RelayError;
use crate::registry::SessionRegistry;

/// Tells both sides of a newly accepted friendship about each other.
///
/// Only the process holding the acceptor acts. A sender connected to a
/// process without the acceptor is not notified.
#[derive(Clone)]
pub struct FriendAcceptRelay {
    registry: SessionRegistry,
    store: Arc<dyn RelationStore>,
    bus: Arc<dyn FanoutBus>,
}

impl FriendAcceptRelay {
    pub fn new(
        registry: SessionRegistry,
        store: Arc<dyn RelationStore>,
        bus: Arc<dyn FanoutBus>,
    ) -> Self {
        Self {
            registry,
            store,
            bus,
        }
    }

    /// Publish an acceptance on the `Friends` topic. Called by the
    /// friend-acceptance logic once the relation is stored.
    pub async fn announce(&self, acceptor: UserId, sender: UserId) -> Result<(), RelayError> {
        let event = BusEvent::FriendAccept(FriendAcceptEvent { acceptor, sender });
        publish_event(self.bus.as_ref(), &event).await?;
        Ok(())
    }

    pub async fn on_bus(&self, event: FriendAcceptEvent) -> Result<(), RelayError> {
        let FriendAcceptEvent { acceptor, sender } = event;

        let Some(acceptor_handle) = self.registry.lookup(&acceptor).await else {
            info!(acceptor = %acceptor, sender = %sender, "Friend acceptor socket not found");
            return Ok(());
        };

        let sender_profile = self.store.profile(&sender).await?;
        acceptor_handle.send(ServerEvent::FriendAdd(sender_profile));

        match self.registry.lookup(&sender).await {
            Some(sender_handle) => {
                let acceptor_profile = self.store.profile(&acceptor).await?;
                sender_handle.send(ServerEvent::FriendAdd(acceptor_profile));
                sender_handle.send(ServerEvent::Online(acceptor.clone()));
                acceptor_handle.send(ServerEvent::Online(sender.clone()));
                debug!(acceptor = %acceptor, sender = %sender, "Both friends connected here");
            }
            None => {
                acceptor_handle.send(ServerEvent::Offline(sender.clone()));
                debug!(acceptor = %acceptor, sender = %sender, "Sender not connected here");
            }
        }
        Ok(())
    }
}
