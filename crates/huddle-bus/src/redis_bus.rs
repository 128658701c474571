//! Redis pub/sub fanout bus.
//!
//! Publishing goes through a shared multiplexed connection. Each
//! subscription owns a dedicated pub/sub connection driven by a background
//! tokio task that forwards messages into an unbounded channel, reconnecting
//! and resubscribing when the connection drops.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::{MultiplexedConnection, PubSub};
use redis::AsyncCommands;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use huddle_shared::Topic;

use crate::error::Result;
use crate::{BusDelivery, FanoutBus, Subscription};

#[derive(Clone)]
pub struct RedisBus {
    client: redis::Client,
    publisher: MultiplexedConnection,
}

impl RedisBus {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let publisher = client.get_multiplexed_async_connection().await?;
        info!("Connected fanout bus to Redis");
        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl FanoutBus for RedisBus {
    async fn publish(&self, topic: Topic, payload: String) -> Result<()> {
        let mut conn = self.publisher.clone();
        let receivers: i64 = conn.publish(topic.as_str(), payload).await?;
        debug!(topic = %topic, receivers, "Published on Redis bus");
        Ok(())
    }

    async fn subscribe(&self, topics: &[Topic]) -> Result<Subscription> {
        let topics = topics.to_vec();
        let pubsub = open_pubsub(&self.client, &topics).await?;
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(forward_with_reconnect(self.client.clone(), topics, pubsub, tx));

        Ok(rx)
    }
}

async fn open_pubsub(client: &redis::Client, topics: &[Topic]) -> Result<PubSub> {
    let mut pubsub = client.get_async_pubsub().await?;
    for topic in topics {
        pubsub.subscribe(topic.as_str()).await?;
        debug!(topic = %topic, "Subscribed to Redis channel");
    }
    Ok(pubsub)
}

/// Forward pub/sub messages into `tx`. When the connection drops, reconnect
/// with backoff and resubscribe to the same channels. Returns once the
/// subscription receiver is dropped.
async fn forward_with_reconnect(
    client: redis::Client,
    topics: Vec<Topic>,
    pubsub: PubSub,
    tx: mpsc::UnboundedSender<BusDelivery>,
) {
    let mut backoff = Backoff::new();
    let mut pubsub = Some(pubsub);

    loop {
        let current = match pubsub.take() {
            Some(current) => current,
            None => match open_pubsub(&client, &topics).await {
                Ok(current) => {
                    info!(attempts = backoff.attempts(), "Resubscribed to Redis bus");
                    backoff.reset();
                    current
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!(
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "Redis bus reconnect failed"
                    );
                    if wait_or_closed(&tx, delay).await {
                        return;
                    }
                    continue;
                }
            },
        };

        if !forward(current, &tx).await {
            debug!("Subscription receiver dropped, closing Redis subscription");
            return;
        }

        let delay = backoff.next_delay();
        warn!(
            retry_in_ms = delay.as_millis() as u64,
            "Redis subscription stream ended, reconnecting"
        );
        if wait_or_closed(&tx, delay).await {
            return;
        }
    }
}

/// Drain one pub/sub connection. `false` once the receiver is gone.
async fn forward(pubsub: PubSub, tx: &mpsc::UnboundedSender<BusDelivery>) -> bool {
    let mut stream = pubsub.into_on_message();
    while let Some(msg) = stream.next().await {
        let topic = match Topic::from_name(msg.get_channel_name()) {
            Ok(topic) => topic,
            Err(e) => {
                warn!(error = %e, "Ignoring message on unexpected channel");
                continue;
            }
        };

        let payload: String = match msg.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(topic = %topic, error = %e, "Ignoring non-text bus payload");
                continue;
            }
        };

        if tx.send(BusDelivery { topic, payload }).is_err() {
            return false;
        }
    }
    !tx.is_closed()
}

/// Sleep for `delay`; `true` if the receiver was dropped meanwhile.
async fn wait_or_closed(tx: &mpsc::UnboundedSender<BusDelivery>, delay: Duration) -> bool {
    tokio::select! {
        () = tokio::time::sleep(delay) => tx.is_closed(),
        () = tx.closed() => true,
    }
}

/// Doubling reconnect delay, capped.
#[derive(Debug)]
struct Backoff {
    attempts: u32,
}

impl Backoff {
    const BASE: Duration = Duration::from_millis(100);
    const MAX: Duration = Duration::from_secs(10);

    fn new() -> Self {
        Self { attempts: 0 }
    }

    fn next_delay(&mut self) -> Duration {
        let factor = 1u32 << self.attempts.min(16);
        self.attempts = self.attempts.saturating_add(1);
        Self::BASE.saturating_mul(factor).min(Self::MAX)
    }

    fn attempts(&self) -> u32 {
        self.attempts
    }

    fn reset(&mut self) {
        self.attempts = 0;
    }
}
