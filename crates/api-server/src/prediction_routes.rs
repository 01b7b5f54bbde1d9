//! Prediction Routes
//!
//! Single-symbol predictions, market batches and symbol search.

use analysis_core::{AnalysisError, Market, PredictionPeriod, PredictionRecord};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use prediction_orchestrator::{MarketPredictions, SearchHit};
use serde::Deserialize;
use serde_json::json;

use crate::{AppError, AppState};

#[derive(Debug, Deserialize)]
pub struct PredictionRequest {
    pub symbol: Option<String>,
    pub market: Option<String>,
    pub period: Option<String>,
}

#[derive(Deserialize)]
pub struct PeriodQuery {
    pub period: Option<String>,
}

#[derive(Deserialize)]
pub struct MarketQuery {
    pub market: Option<String>,
}

pub fn prediction_routes() -> Router<AppState> {
    Router::new()
        .route("/api/predictions", post(create_prediction))
        .route("/api/predictions/:market", get(market_predictions))
        .route("/api/search/:symbol", get(search_symbol))
}

fn parse_period(raw: Option<&str>) -> Result<PredictionPeriod, AppError> {
    match raw {
        Some(p) => p.parse().map_err(|e: AnalysisError| AppError::bad_request(strip_kind(e))),
        None => Ok(PredictionPeriod::default()),
    }
}

fn parse_market(raw: &str) -> Result<Market, AppError> {
    raw.parse()
        .map_err(|e: AnalysisError| AppError::bad_request(strip_kind(e)))
}

/// Error message without its kind prefix.
fn strip_kind(err: AnalysisError) -> String {
    match err {
        AnalysisError::InvalidInput(msg) | AnalysisError::NotFound(msg) => msg,
        other => other.to_string(),
    }
}

/// POST /api/predictions
async fn create_prediction(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PredictionRecord>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::bad_request("Request body is required"));
    }
    let request: PredictionRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::bad_request(format!("Invalid JSON body: {}", e)))?;

    let symbol = request
        .symbol
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_uppercase)
        .ok_or_else(|| AppError::bad_request("Symbol is required"))?;
    let market = match request.market.as_deref() {
        Some(m) => parse_market(m)?,
        None => Market::Us,
    };
    let period = parse_period(request.period.as_deref())?;

    let record = state
        .service
        .predict(&symbol, market, period)
        .await
        .map_err(|e| {
            AppError::from_analysis(
                e,
                format!(
                    "Could not generate prediction for {}. Please check the symbol and try again.",
                    symbol
                ),
            )
        })?;

    Ok(Json(record))
}

/// GET /api/predictions/:market
async fn market_predictions(
    State(state): State<AppState>,
    Path(market): Path<String>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<MarketPredictions>, AppError> {
    let market = parse_market(&market).map_err(|_| AppError::bad_request("Invalid market"))?;
    let period = parse_period(query.period.as_deref())?;

    Ok(Json(state.service.predict_market(market, period).await))
}

/// GET /api/search/:symbol
async fn search_symbol(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<MarketQuery>,
) -> Result<Json<SearchHit>, Response> {
    let symbol = symbol.to_uppercase();
    // Unknown market values fall back to searching by suffix
    let market = query
        .market
        .as_deref()
        .and_then(|m| m.parse::<Market>().ok());

    state.service.search(&symbol, market).await.map(Json).map_err(|e| {
        (
            StatusCode::NOT_FOUND,
            Json(json!({
                "symbol": symbol,
                "found": false,
                "error": strip_kind(e),
                "timestamp": Utc::now(),
            })),
        )
            .into_response()
    })
}
