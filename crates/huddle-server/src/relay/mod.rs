//! The presence-aware relay of one process.
//!
//! [`Relay`] wires the session registry, the connection lifecycle and the
//! three topic relays to a shared store and fanout bus. Client events enter
//! through [`Relay::handle_client_event`]; bus traffic through
//! [`Relay::run_dispatcher`], which handles deliveries one at a time in
//! arrival order.

pub mod friend_accept;
pub mod friend_requests;
pub mod messages;

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use huddle_bus::{BusDelivery, FanoutBus, Subscription};
use huddle_shared::{BusEvent, ClientEvent, Topic};
use huddle_store::RelationStore;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::lifecycle::{ConnectionManager, Session};
use crate::registry::SessionRegistry;

pub use friend_accept::FriendAcceptRelay;
pub use friend_requests::FriendRequestRelay;
pub use messages::MessageRelay;

#[derive(Clone)]
pub struct Relay {
    connections: ConnectionManager,
    messages: MessageRelay,
    friend_requests: FriendRequestRelay,
    friend_accepts: FriendAcceptRelay,
    bus: Arc<dyn FanoutBus>,
}

impl Relay {
    pub fn new(
        store: Arc<dyn RelationStore>,
        bus: Arc<dyn FanoutBus>,
        config: RelayConfig,
    ) -> Self {
        let registry = SessionRegistry::new();

        Self {
            connections: ConnectionManager::new(
                registry.clone(),
                store.clone(),
                config.outbound_buffer,
            ),
            messages: MessageRelay::new(
                registry.clone(),
                store.clone(),
                bus.clone(),
                config.unread_policy,
            ),
            friend_requests: FriendRequestRelay::new(registry.clone(), store.clone(), bus.clone()),
            friend_accepts: FriendAcceptRelay::new(registry, store, bus.clone()),
            bus,
        }
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn registry(&self) -> &SessionRegistry {
        self.connections.registry()
    }

    pub fn messages(&self) -> &MessageRelay {
        &self.messages
    }

    pub fn friend_requests(&self) -> &FriendRequestRelay {
        &self.friend_requests
    }

    pub fn friend_accepts(&self) -> &FriendAcceptRelay {
        &self.friend_accepts
    }

    /// Subscribe this process to all relay topics.
    pub async fn subscribe(&self) -> Result<Subscription, RelayError> {
        Ok(self.bus.subscribe(&Topic::ALL).await?)
    }

    /// Handle an event sent by the client of `session`.
    pub async fn handle_client_event(
        &self,
        session: &Session,
        event: ClientEvent,
    ) -> Result<(), RelayError> {
        match event {
            ClientEvent::Message(record) => {
                debug!(session = %session.id(), to = %record.partner_id, "Client sent message");
                self.messages.on_local(record).await
            }
            ClientEvent::FriendRequest(request) => {
                debug!(session = %session.id(), to = %request.to, "Client sent friend request");
                self.friend_requests.on_local(request).await
            }
        }
    }

    /// Decode one bus delivery and hand it to the matching relay.
    ///
    /// Undecodable payloads are skipped. A failure while handling a delivery
    /// aborts that delivery only.
    pub async fn dispatch(&self, delivery: &BusDelivery) {
        let event = match BusEvent::decode(delivery.topic, &delivery.payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    topic = %delivery.topic,
                    error = %e,
                    "Dropping malformed bus payload"
                );
                return;
            }
        };

        let result = match event {
            BusEvent::Message(record) => self.messages.on_bus(record).await,
            BusEvent::FriendRequest(request) => self.friend_requests.on_bus(request).await,
            BusEvent::FriendAccept(accept) => self.friend_accepts.on_bus(accept).await,
        };

        if let Err(e) = result {
            error!(topic = %delivery.topic, error = %e, "Failed to handle bus event");
        }
    }

    /// Process bus deliveries until the subscription closes.
    pub async fn run_dispatcher(self, mut subscription: Subscription) {
        info!("Bus dispatcher started");
        while let Some(delivery) = subscription.recv().await {
            self.dispatch(&delivery).await;
        }
        warn!("Bus subscription closed, dispatcher stopped");
    }
}
