use thiserror::Error;

use huddle_shared::ProtocolError;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

pub type Result<T> = std::result::Result<T, BusError>;
