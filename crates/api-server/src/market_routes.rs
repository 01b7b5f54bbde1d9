use analysis_core::{PriceSource, StockSnapshot};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use prediction_orchestrator::IndicatorReport;
use serde::Deserialize;

use crate::{AppError, AppState};

#[derive(Deserialize)]
pub struct StockDataQuery {
    #[serde(default = "default_days")]
    pub days: i64,
    /// yahoo | alpha_vantage | coingecko
    pub source: Option<String>,
}

fn default_days() -> i64 {
    30
}

#[derive(Deserialize)]
pub struct IndicatorQuery {
    #[serde(default = "default_period")]
    pub period: String,
}

fn default_period() -> String {
    "1m".to_string()
}

pub fn market_routes() -> Router<AppState> {
    Router::new()
        .route("/api/stock-data/:symbol", get(stock_data))
        .route("/api/technical-indicators/:symbol", get(technical_indicators))
}

async fn stock_data(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<StockDataQuery>,
) -> Result<Json<StockSnapshot>, AppError> {
    let symbol = symbol.to_uppercase();
    let source = query
        .source
        .as_deref()
        .map(str::parse::<PriceSource>)
        .transpose()
        .map_err(|e| AppError::from_analysis(e, "Invalid price source"))?;

    let snapshot = state
        .service
        .stock_data(&symbol, query.days, source)
        .await
        .map_err(|e| AppError::from_analysis(e, format!("Could not fetch data for {}", symbol)))?;

    Ok(Json(snapshot))
}

async fn technical_indicators(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<IndicatorQuery>,
) -> Result<Json<IndicatorReport>, AppError> {
    let symbol = symbol.to_uppercase();

    let report = state
        .service
        .indicators(&symbol, &query.period)
        .await
        .map_err(|e| {
            AppError::from_analysis(e, format!("Could not calculate indicators for {}", symbol))
        })?;

    Ok(Json(report))
}
