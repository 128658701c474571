use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown bus topic: {0}")]
    UnknownTopic(String),

    #[error("Malformed friend acceptance: {0}")]
    MalformedAcceptance(String),
}
