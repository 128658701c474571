//! In-process fanout bus.
//!
//! Every clone shares one subscriber list, so relay instances created from
//! clones of the same bus behave like processes attached to one Redis.
//! Delivery order per subscriber is publish order.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use huddle_shared::Topic;

use crate::error::Result;
use crate::{BusDelivery, FanoutBus, Subscription};

struct Subscriber {
    topics: Vec<Topic>,
    tx: mpsc::UnboundedSender<BusDelivery>,
}

#[derive(Clone, Default)]
pub struct MemoryBus {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions (dropped receivers are pruned lazily on
    /// publish).
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }
}

#[async_trait]
impl FanoutBus for MemoryBus {
    async fn publish(&self, topic: Topic, payload: String) -> Result<()> {
        let mut subscribers = self.subscribers.lock().await;
        subscribers.retain(|s| !s.tx.is_closed());

        let mut delivered = 0usize;
        for subscriber in subscribers.iter().filter(|s| s.topics.contains(&topic)) {
            let delivery = BusDelivery {
                topic,
                payload: payload.clone(),
            };
            if subscriber.tx.send(delivery).is_ok() {
                delivered += 1;
            }
        }

        debug!(topic = %topic, delivered, "Published on memory bus");
        Ok(())
    }

    async fn subscribe(&self, topics: &[Topic]) -> Result<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().await.push(Subscriber {
            topics: topics.to_vec(),
            tx,
        });
        Ok(rx)
    }
}
