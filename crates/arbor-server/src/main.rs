//! Arbor signaling server binary

use tracing_subscriber::EnvFilter;

use arbor_core::{ArborError, ArborResult};
use arbor_server::{router, RoomRegistry, ServerConfig};

#[tokio::main]
async fn main() -> ArborResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env();
    let registry = RoomRegistry::new();
    let app = router(registry);

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .map_err(|e| ArborError::Transport(e.to_string()))?;
    tracing::info!(addr = %config.bind_addr(), "arbor signaling server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| ArborError::Transport(e.to_string()))
}
