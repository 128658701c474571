use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use huddle_bus::BusError;
use huddle_shared::ProtocolError;
use huddle_store::StoreError;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Missing session token")]
    MissingToken,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            RelayError::MissingToken => (StatusCode::UNAUTHORIZED, self.to_string()),
            RelayError::Protocol(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            RelayError::Store(_) | RelayError::Bus(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
