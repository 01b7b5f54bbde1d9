use analysis_core::AnalysisError;
use axum::{
    http::{HeaderValue, Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    Json, Router,
};
use prediction_orchestrator::PredictionService;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod health;
pub mod market_routes;
pub mod model_routes;
pub mod prediction_routes;
pub mod request_id;

pub use config::AppConfig;

#[cfg(test)]
#[path = "router_tests.rs"]
mod router_tests;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
}

impl AppState {
    pub fn new(service: PredictionService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Handler error rendered as `{"error": ...}` with a status code.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    pub fn with_status(status: StatusCode, error: impl Into<anyhow::Error>) -> Self {
        Self {
            status,
            error: error.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, anyhow::anyhow!(message.into()))
    }

    /// Map a pipeline error. Upstream and model failures are reported with
    /// `fallback` instead of the provider's message.
    pub fn from_analysis(err: AnalysisError, fallback: impl Into<String>) -> Self {
        match err {
            AnalysisError::InvalidInput(msg) => Self::bad_request(msg),
            AnalysisError::NotFound(_)
            | AnalysisError::ApiError(_)
            | AnalysisError::InsufficientData(_)
            | AnalysisError::ModelError(_) => {
                tracing::warn!("{}", err);
                Self::bad_request(fallback)
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("Internal error: {:#}", self.error);
        }
        (self.status, Json(json!({ "error": self.error.to_string() }))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, err)
    }
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Endpoint not found" }))).into_response()
}

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origins {
        Some(origins) => {
            let parsed: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|o| match HeaderValue::from_str(o) {
                    Ok(v) => Some(v),
                    Err(_) => {
                        tracing::warn!("Ignoring invalid CORS origin: {}", o);
                        None
                    }
                })
                .collect();
            layer.allow_origin(parsed)
        }
        None => layer.allow_origin(Any),
    }
}

pub fn build_router(state: AppState, cors_origins: Option<&[String]>) -> Router {
    Router::new()
        .merge(health::health_routes())
        .merge(prediction_routes::prediction_routes())
        .merge(market_routes::market_routes())
        .merge(model_routes::model_routes())
        .fallback(not_found)
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// `RUST_LOG` filter (default info); `RUST_LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    tracing::info!("Starting FinPredict API");

    let config = AppConfig::from_env()?;
    tracing::info!("Configuration loaded");
    tracing::info!("  Price source: {}", config.price_source);
    tracing::info!("  Forecast strategy: {}", config.forecast_strategy);
    tracing::info!(
        "  Lookback: {} points, epochs: {}, history: {} days",
        config.forecast_lookback,
        config.forecast_epochs,
        config.history_days
    );
    tracing::info!(
        "  Cache TTL: {}",
        if config.cache_ttl_secs > 0 {
            format!("{}s", config.cache_ttl_secs)
        } else {
            "disabled".to_string()
        }
    );

    let state = AppState::new(config.build_service());
    let app = build_router(state, config.cors_origins.as_deref());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
