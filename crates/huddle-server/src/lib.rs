//! # huddle-server
//!
//! Presence-aware chat relay. Each process keeps its own registry of
//! connected sessions and learns about users connected elsewhere only
//! through the fanout bus:
//! - **Session registry** mapping session ids to live connections
//! - **Connection lifecycle** with same-process presence exchange
//! - **Message relay** with per-conversation history and unread counter
//! - **Friend request / acceptance relays**
//! - **WebSocket transport** and health routes (axum)

pub mod api;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod relay;
pub mod ws;

pub use config::{RelayConfig, ServerConfig, UnreadPolicy};
pub use error::RelayError;
pub use lifecycle::{ConnectionManager, Session};
pub use registry::{ConnectionHandle, SessionRegistry};
pub use relay::Relay;
