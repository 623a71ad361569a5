//! Serve command - runs the key validation HTTP server

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;

use crate::api::{self, AppState};
use crate::config::AppConfig;
use crate::infrastructure::logging;

/// Run the HTTP server.
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    logging::init_logging(&config.logging);

    let state: AppState = crate::create_app_state(&config).await?;
    let app = api::create_router(state);

    let addr = build_socket_addr(&config)?;
    info!("Starting key validation server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_socket_addr(config: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    )))
}
