//! WebSocket transport.
//!
//! `GET /ws?token=<token>` upgrades to a WebSocket carrying JSON text frames
//! (`{"event": .., "data": ..}`). Each connection runs a writer task that
//! drains the session's outbound queue and a reader loop that feeds client
//! events to the relay in arrival order. Closing the socket disconnects the
//! session.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, error, warn};

use huddle_shared::ClientEvent;

use crate::api::AppState;
use crate::error::RelayError;
use crate::lifecycle::session_id_from_token;
use crate::relay::Relay;

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

/// GET /ws?token=...
/// Rejects a missing token with 401 before upgrading.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, RelayError> {
    let session_id = session_id_from_token(params.token.as_deref())?;
    let relay = state.relay.clone();

    debug!(session = %session_id, "Upgrading WebSocket connection");

    Ok(ws.on_upgrade(move |socket| run_connection(socket, relay, session_id.to_string())))
}

async fn run_connection(socket: WebSocket, relay: Relay, token: String) {
    let (session, mut outbound) = match relay.connections().connect(Some(&token)).await {
        Ok(connected) => connected,
        Err(e) => {
            error!(error = %e, "Failed to establish session, closing socket");
            let _ = socket.close().await;
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let session_id = session.id().clone();
    let writer = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let text = match event.to_json() {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Failed to encode notification");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
        debug!(session = %session_id, "WebSocket writer finished");
    });

    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => match ClientEvent::from_json(&text) {
                Ok(event) => {
                    if let Err(e) = relay.handle_client_event(&session, event).await {
                        error!(session = %session.id(), error = %e, "Failed to handle client event");
                    }
                }
                Err(e) => {
                    warn!(session = %session.id(), error = %e, "Ignoring unparseable client frame");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(session = %session.id(), error = %e, "WebSocket read error");
                break;
            }
        }
    }

    relay.connections().disconnect(session).await;
    writer.abort();
}
