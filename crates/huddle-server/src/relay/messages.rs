//! Direct-message relay and unread-counter bookkeeping.
//!
//! A message sent by a local client is published on `MESSAGES` and then
//! recorded once, here, on the process that accepted it. Every process
//! (this one included) delivers the bus copy to the partner if the partner
//! is connected locally.
//!
//! `unread` counts messages sent while the partner was not connected to the
//! sending process. It is partner-centric, not a per-reader unseen count.

use std::sync::Arc;

use tracing::{debug, info};

use huddle_bus::{publish_event, FanoutBus};
use huddle_shared::{BusEvent, ConversationKey, MessageRecord, ServerEvent};
use huddle_store::RelationStore;

use crate::config::UnreadPolicy;
use crate::error::RelayError;
use crate::registry::SessionRegistry;

#[derive(Clone)]
pub struct MessageRelay {
    registry: SessionRegistry,
    store: Arc<dyn RelationStore>,
    bus: Arc<dyn FanoutBus>,
    unread_policy: UnreadPolicy,
}

impl MessageRelay {
    pub fn new(
        registry: SessionRegistry,
        store: Arc<dyn RelationStore>,
        bus: Arc<dyn FanoutBus>,
        unread_policy: UnreadPolicy,
    ) -> Self {
        Self {
            registry,
            store,
            bus,
            unread_policy,
        }
    }

    /// A local client sent `record`: fan it out, then record it.
    pub async fn on_local(&self, record: MessageRecord) -> Result<(), RelayError> {
        publish_event(self.bus.as_ref(), &BusEvent::Message(record.clone())).await?;
        self.record(&record).await
    }

    /// Unread bookkeeping plus history append for one message.
    pub async fn record(&self, record: &MessageRecord) -> Result<(), RelayError> {
        let key = ConversationKey::new(&record.partner_id, &record.user_id);

        let existing = self.store.unread(&key).await?;
        if existing.is_none() {
            self.store.set_unread(&key, 1).await?;
        }

        let partner_local = self.registry.contains(&record.partner_id).await;
        let sender_local = self.registry.contains(&record.user_id).await;

        // Partner unreachable from here while the sending side is. A counter
        // created just above is not raised again.
        if !partner_local && sender_local {
            if let Some(count) = existing {
                let unread = match self.unread_policy {
                    UnreadPolicy::Compatible => {
                        // Read-then-write: concurrent senders may lose an update.
                        self.store.set_unread(&key, count + 1).await?;
                        count + 1
                    }
                    UnreadPolicy::Atomic => self.store.increment_unread(&key).await?,
                };
                debug!(conversation = %key, unread, "Raised unread counter");
            }
        }

        self.store.append_message(&key, record).await?;
        Ok(())
    }

    /// A `MESSAGES` payload arrived from the bus.
    pub async fn on_bus(&self, record: MessageRecord) -> Result<(), RelayError> {
        let partner = record.partner_id.clone();
        let sender = record.user_id.clone();
        let sender_local = self.registry.contains(&sender).await;

        match self.registry.lookup(&partner).await {
            Some(handle) => {
                handle.send(ServerEvent::Message(record));
                debug!(from = %sender, to = %partner, "Delivered message");
            }
            None if sender_local => {
                debug!(from = %sender, to = %partner, "Partner not connected here");
            }
            None => {
                info!(from = %sender, to = %partner, "Message socket not found");
            }
        }
        Ok(())
    }
}
