//! # huddle-store
//!
//! The shared relation store every relay process reads and writes: friend
//! sets, profile blobs, and per-conversation sorted sets holding the message
//! history plus the `unread` counter.
//!
//! The store is consumed through the [`RelationStore`] trait. [`RedisStore`]
//! is the production backend; [`MemoryStore`] backs tests and single-process
//! development runs. No operation spans more than one key, so multi-step
//! updates made by callers are not atomic.

pub mod memory;
pub mod redis_store;

mod error;

use async_trait::async_trait;

use huddle_shared::{ConversationKey, MessageRecord, UserId};

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

#[async_trait]
pub trait RelationStore: Send + Sync {
    /// Members of `user:{id}:Friends`.
    async fn friends(&self, user: &UserId) -> Result<Vec<UserId>>;

    /// Profile blob stored under `user:{id}`, passed through untouched.
    async fn profile(&self, user: &UserId) -> Result<Option<String>>;

    /// Current `unread` score of the conversation, if one was ever written.
    async fn unread(&self, key: &ConversationKey) -> Result<Option<u64>>;

    /// Overwrite the `unread` score.
    async fn set_unread(&self, key: &ConversationKey, count: u64) -> Result<()>;

    /// Raise the `unread` score by one in a single store-side step and
    /// return the new value.
    async fn increment_unread(&self, key: &ConversationKey) -> Result<u64>;

    /// Add a record to the conversation history, scored by its timestamp.
    async fn append_message(&self, key: &ConversationKey, record: &MessageRecord) -> Result<()>;

    /// Conversation history in ascending timestamp order.
    async fn history(&self, key: &ConversationKey) -> Result<Vec<MessageRecord>>;
}
