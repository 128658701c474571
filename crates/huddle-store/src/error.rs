use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Redis command or connection failure.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A stored record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
