//! In-process store with Redis-like set, string and sorted-set semantics.
//!
//! Clones share the same data, so several relay instances in one test can
//! observe each other's writes the way separate processes share Redis.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use huddle_shared::constants::UNREAD_MEMBER;
use huddle_shared::{ConversationKey, MessageRecord, UserId};

use crate::error::Result;
use crate::RelationStore;

#[derive(Debug, Default)]
struct Inner {
    sets: HashMap<String, BTreeSet<String>>,
    strings: HashMap<String, String>,
    sorted: HashMap<String, HashMap<String, f64>>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `friend` to `user`'s friend set (one direction only).
    pub async fn add_friend(&self, user: &UserId, friend: &UserId) {
        let mut inner = self.inner.lock().await;
        inner
            .sets
            .entry(user.friends_key())
            .or_default()
            .insert(friend.to_string());
    }

    /// Record a friendship in both directions.
    pub async fn befriend(&self, a: &UserId, b: &UserId) {
        self.add_friend(a, b).await;
        self.add_friend(b, a).await;
    }

    pub async fn set_profile(&self, user: &UserId, profile: impl Into<String>) {
        let mut inner = self.inner.lock().await;
        inner.strings.insert(user.profile_key(), profile.into());
    }
}

#[async_trait]
impl RelationStore for MemoryStore {
    async fn friends(&self, user: &UserId) -> Result<Vec<UserId>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .sets
            .get(&user.friends_key())
            .map(|set| set.iter().map(|id| UserId::from(id.as_str())).collect())
            .unwrap_or_default())
    }

    async fn profile(&self, user: &UserId) -> Result<Option<String>> {
        let inner = self.inner.lock().await;
        Ok(inner.strings.get(&user.profile_key()).cloned())
    }

    async fn unread(&self, key: &ConversationKey) -> Result<Option<u64>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .sorted
            .get(&key.store_key())
            .and_then(|members| members.get(UNREAD_MEMBER))
            .map(|score| *score as u64))
    }

    async fn set_unread(&self, key: &ConversationKey, count: u64) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .sorted
            .entry(key.store_key())
            .or_default()
            .insert(UNREAD_MEMBER.to_string(), count as f64);
        Ok(())
    }

    async fn increment_unread(&self, key: &ConversationKey) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let score = inner
            .sorted
            .entry(key.store_key())
            .or_default()
            .entry(UNREAD_MEMBER.to_string())
            .or_insert(0.0);
        *score += 1.0;
        Ok(*score as u64)
    }

    async fn append_message(&self, key: &ConversationKey, record: &MessageRecord) -> Result<()> {
        let member = serde_json::to_string(record)?;
        let mut inner = self.inner.lock().await;
        inner
            .sorted
            .entry(key.store_key())
            .or_default()
            .insert(member, record.timestamp as f64);
        debug!(conversation = %key, timestamp = record.timestamp, "Appended message");
        Ok(())
    }

    async fn history(&self, key: &ConversationKey) -> Result<Vec<MessageRecord>> {
        let mut entries: Vec<(String, f64)> = {
            let inner = self.inner.lock().await;
            inner
                .sorted
                .get(&key.store_key())
                .map(|members| {
                    members
                        .iter()
                        .filter(|(member, _)| member.as_str() != UNREAD_MEMBER)
                        .map(|(member, score)| (member.clone(), *score))
                        .collect()
                })
                .unwrap_or_default()
        };

        // Same ordering as ZRANGEBYSCORE: score, then member bytes
        entries.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let mut records = Vec::with_capacity(entries.len());
        for (member, _) in entries {
            records.push(serde_json::from_str(&member)?);
        }
        Ok(records)
    }
}
