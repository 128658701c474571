use std::sync::Arc;

use axum::{
    extract::State,
    http::Method,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::relay::Relay;
use crate::ws::ws_upgrade;

#[derive(Clone)]
pub struct AppState {
    pub relay: Relay,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/ws", get(ws_upgrade))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    sessions: usize,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        sessions: state.relay.registry().len().await,
    })
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP / WebSocket server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use huddle_bus::MemoryBus;
    use huddle_store::MemoryStore;

    use crate::config::RelayConfig;

    fn state() -> AppState {
        let relay = Relay::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryBus::new()),
            RelayConfig::default(),
        );
        AppState {
            relay,
            config: Arc::new(ServerConfig::default()),
        }
    }

    #[tokio::test]
    async fn test_health_route() {
        let app = build_router(state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_info_route() {
        let state = state();
        let _session = state.relay.connections().connect(Some("alice")).await.unwrap();
        assert_eq!(state.relay.registry().len().await, 1);

        let app = build_router(state);
        let response = app
            .oneshot(Request::builder().uri("/info").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = build_router(state());
        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
