//! Redis-backed relation store.
//!
//! Key layout:
//! - `user:{id}:Friends` -- set of friend ids
//! - `user:{id}` -- profile blob (string)
//! - `user:messages:{larger}--{lower}` -- sorted set; member `unread` is the
//!   counter, every other member is a JSON message scored by its timestamp

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, info};

use huddle_shared::constants::UNREAD_MEMBER;
use huddle_shared::{ConversationKey, MessageRecord, UserId};

use crate::error::Result;
use crate::RelationStore;

/// Store handle over a multiplexed Redis connection. Cheap to clone.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!("Connected relation store to Redis");
        Ok(Self { conn })
    }

    /// Round-trip a PING to check the connection is alive.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl RelationStore for RedisStore {
    async fn friends(&self, user: &UserId) -> Result<Vec<UserId>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.smembers(user.friends_key()).await?;
        Ok(members.into_iter().map(UserId::from).collect())
    }

    async fn profile(&self, user: &UserId) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let profile: Option<String> = conn.get(user.profile_key()).await?;
        Ok(profile)
    }

    async fn unread(&self, key: &ConversationKey) -> Result<Option<u64>> {
        let mut conn = self.conn.clone();
        let score: Option<f64> = conn.zscore(key.store_key(), UNREAD_MEMBER).await?;
        Ok(score.map(|s| s as u64))
    }

    async fn set_unread(&self, key: &ConversationKey, count: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.zadd(key.store_key(), UNREAD_MEMBER, count).await?;
        Ok(())
    }

    async fn increment_unread(&self, key: &ConversationKey) -> Result<u64> {
        let mut conn = self.conn.clone();
        let score: f64 = conn.zincr(key.store_key(), UNREAD_MEMBER, 1).await?;
        Ok(score as u64)
    }

    async fn append_message(&self, key: &ConversationKey, record: &MessageRecord) -> Result<()> {
        let member = serde_json::to_string(record)?;
        let mut conn = self.conn.clone();
        let _: () = conn.zadd(key.store_key(), member, record.timestamp).await?;
        debug!(conversation = %key, timestamp = record.timestamp, "Appended message");
        Ok(())
    }

    async fn history(&self, key: &ConversationKey) -> Result<Vec<MessageRecord>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.zrangebyscore(key.store_key(), "-inf", "+inf").await?;

        let mut records = Vec::with_capacity(members.len());
        for member in members.iter().filter(|m| m.as_str() != UNREAD_MEMBER) {
            records.push(serde_json::from_str(member)?);
        }
        Ok(records)
    }
}
