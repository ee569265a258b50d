//! Meridian Backend: portfolio API
//!
//! Responsibilities:
//! - REST API over the multi-chain portfolio aggregator
//! - Keeps the provider API key server-side
//! - One shared cache and rate-limit state for all clients

mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

use state::AppState;

const DEFAULT_BIND: &str = "0.0.0.0:3001";
const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = meridian_core::load_config()?;

    tracing::info!("Meridian backend starting...");

    let state = Arc::new(AppState::from_config(&config)?);

    let aggregator = Arc::clone(&state.aggregator);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CACHE_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            let purged = aggregator.purge_caches();
            if purged > 0 {
                tracing::debug!(purged, "Purged expired cache entries");
            }
        }
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .nest("/api", routes::api_router())
        .layer(cors)
        .with_state(state);

    let bind = std::env::var("MERIDIAN_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let addr: SocketAddr = bind.parse()?;
    tracing::info!("Listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
