use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use huddle_bus::RedisBus;
use huddle_server::api::{self, AppState};
use huddle_server::{Relay, ServerConfig};
use huddle_store::RedisStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,huddle_server=debug")),
        )
        .init();

    info!("Starting Huddle relay v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration (no Redis URL, no relay)
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    let redis_url = config.require_redis_url()?.to_string();
    info!(
        instance = %config.instance_name,
        http_addr = %config.http_addr,
        unread_policy = ?config.unread_policy,
        outbound_buffer = config.outbound_buffer,
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Connect the shared store and the fanout bus
    // -----------------------------------------------------------------------
    let store = RedisStore::connect(&redis_url).await?;
    store.ping().await?;
    let bus = RedisBus::connect(&redis_url).await?;

    let relay = Relay::new(Arc::new(store), Arc::new(bus), config.relay_config());

    // -----------------------------------------------------------------------
    // 4. Subscribe to the bus and spawn the dispatcher
    // -----------------------------------------------------------------------
    let subscription = relay.subscribe().await?;
    let mut dispatcher = tokio::spawn(relay.clone().run_dispatcher(subscription));

    // -----------------------------------------------------------------------
    // 5. Run the HTTP / WebSocket server (blocks until shutdown)
    // -----------------------------------------------------------------------
    let http_addr = config.http_addr;
    let app_state = AppState {
        relay,
        config: Arc::new(config),
    };

    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        joined = &mut dispatcher => {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Bus dispatcher panicked");
            }
            anyhow::bail!("bus dispatcher stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
