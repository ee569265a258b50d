//! Health check endpoint.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let prices = state.aggregator.prices().cache_stats();
    let tokens = state.aggregator.tokens().cache_stats();
    Json(json!({
        "status": "ok",
        "service": "meridian-backend",
        "version": env!("CARGO_PKG_VERSION"),
        "cache": {
            "prices": prices,
            "tokens": tokens,
        },
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}
