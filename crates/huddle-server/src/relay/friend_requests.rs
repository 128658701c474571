use std::sync::Arc;

use tracing::{debug, info};

use huddle_bus::{publish_event, FanoutBus};
use huddle_shared::{BusEvent, FriendRequestEvent, ServerEvent};
use huddle_store::RelationStore;

use crate::error::RelayError;
use crate::registry::SessionRegistry;

/// Forwards friend requests to the addressee wherever it is connected.
#[derive(Clone)]
pub struct FriendRequestRelay {
    registry: SessionRegistry,
    store: Arc<dyn RelationStore>,
    bus: Arc<dyn FanoutBus>,
}

impl FriendRequestRelay {
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

    pub async fn on_local(&self, request: FriendRequestEvent) -> Result<(), RelayError> {
        publish_event(self.bus.as_ref(), &BusEvent::FriendRequest(request)).await?;
        Ok(())
    }

    pub async fn on_bus(&self, request: FriendRequestEvent) -> Result<(), RelayError> {
        let Some(handle) = self.registry.lookup(&request.to).await else {
            info!(from = %request.from, to = %request.to, "Friend request socket not found");
            return Ok(());
        };

        let profile = self.store.profile(&request.from).await?;
        handle.send(ServerEvent::FriendRequest(profile));
        debug!(from = %request.from, to = %request.to, "Delivered friend request");
        Ok(())
    }
}
