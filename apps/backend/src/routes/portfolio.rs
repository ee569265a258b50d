//! Portfolio API routes.
//!
//! GET /api/portfolio/:address?chains=1,137&top=5: Multi-chain wallet portfolio
//! GET /api/portfolio/:address/rebalance?targets=ETH:50,USDC:50: Rebalance preview (default targets when omitted)
//! GET /api/prices/:chain_id?addresses=0x..,0x..: Cached USD quotes
//! GET /api/chains: Supported chains

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use meridian_common::{Chain, PriceQuote};
use meridian_types::config::parse_chain_list;
use meridian_utils::analytics::default_targets;
use meridian_utils::output::{PortfolioOutput, RebalanceOutput};
use meridian_utils::parse::{parse_address, parse_targets};
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ApiError;
use crate::state::AppState;

/// Allocation chart slices when `top` is not given.
const DEFAULT_CHART_SLICES: usize = 5;

#[derive(Debug, Default, Deserialize)]
pub struct PortfolioQuery {
    /// Comma-separated chain IDs (default: config `default_chain_ids`).
    chains: Option<String>,
    top: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RebalanceQuery {
    targets: Option<String>,
    chains: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PricesQuery {
    addresses: Option<String>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/portfolio/:address", get(get_portfolio))
        .route("/portfolio/:address/rebalance", get(get_rebalance))
        .route("/prices/:chain_id", get(get_prices))
        .route("/chains", get(get_chains))
}

fn chain_ids(state: &AppState, raw: Option<&str>) -> Result<Vec<u64>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => parse_chain_list(raw).map_err(|e| ApiError::BadRequest(format!("chains: {e}"))),
        None => Ok(state.config.portfolio.default_chain_ids.clone()),
    }
}

/// GET /api/portfolio/:address?chains=1,137
async fn get_portfolio(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Query(query): Query<PortfolioQuery>,
) -> Result<Json<PortfolioOutput>, ApiError> {
    let address = parse_address(&address)?;
    let chains = chain_ids(&state, query.chains.as_deref())?;

    let (portfolio, report) = state
        .aggregator
        .get_portfolio_with_report(&address, &chains)
        .await;
    let top = query.top.unwrap_or(DEFAULT_CHART_SLICES);
    Ok(Json(PortfolioOutput::new(portfolio, report, top)))
}

/// GET /api/portfolio/:address/rebalance?targets=ETH:50,USDC:50
async fn get_rebalance(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Query(query): Query<RebalanceQuery>,
) -> Result<Json<RebalanceOutput>, ApiError> {
    let address = parse_address(&address)?;
    let (targets, defaulted) = match query.targets.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => (parse_targets(&[raw])?, false),
        _ => (default_targets(), true),
    };
    let chains = chain_ids(&state, query.chains.as_deref())?;

    let portfolio = state.aggregator.get_portfolio(&address, &chains).await;
    Ok(Json(RebalanceOutput::new(&portfolio, targets, defaulted)))
}

/// GET /api/prices/:chain_id?addresses=0x..,0x..
async fn get_prices(
    State(state): State<Arc<AppState>>,
    Path(chain_id): Path<u64>,
    Query(query): Query<PricesQuery>,
) -> Result<Json<Vec<PriceQuote>>, ApiError> {
    let chain = Chain::try_from(chain_id)?;
    let addresses: Vec<&str> = query
        .addresses
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .collect();
    if addresses.is_empty() {
        return Err(ApiError::BadRequest("missing 'addresses' query parameter".into()));
    }
    Ok(Json(state.aggregator.prices().get_quotes(chain, &addresses).await))
}

/// GET /api/chains
async fn get_chains() -> Json<Value> {
    let chains: Vec<Value> = Chain::ALL
        .iter()
        .map(|c| json!({ "id": c.id(), "name": c.name(), "nativeSymbol": c.native_symbol() }))
        .collect();
    Json(json!({ "chains": chains }))
}
