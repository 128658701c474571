//! Fanout bus: the publish/subscribe layer relay processes use to reach each
//! other's connected users.

pub mod memory;
pub mod redis_bus;

mod error;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use huddle_shared::{BusEvent, Topic};

pub use error::{BusError, Result};
pub use memory::MemoryBus;
pub use redis_bus::RedisBus;

/// A raw payload received on one of the subscribed topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusDelivery {
    pub topic: Topic,
    pub payload: String,
}

/// Receiving half of a bus subscription. Closed when the bus shuts down.
pub type Subscription = mpsc::UnboundedReceiver<BusDelivery>;

#[async_trait]
pub trait FanoutBus: Send + Sync {
    /// Publish a payload to every subscriber of `topic`, the publisher's own
    /// subscription included. Fire-and-forget: no acknowledgement.
    async fn publish(&self, topic: Topic, payload: String) -> Result<()>;

    /// Start receiving payloads published on any of `topics`.
    async fn subscribe(&self, topics: &[Topic]) -> Result<Subscription>;
}

/// Encode a bus event and publish it on its own topic.
pub async fn publish_event(bus: &dyn FanoutBus, event: &BusEvent) -> Result<()> {
    let topic = event.topic();
    let payload = event.encode()?;

    debug!(topic = %topic, payload_len = payload.len(), "Publishing bus event");

    bus.publish(topic, payload).await
}
