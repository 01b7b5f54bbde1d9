use analysis_core::Market;
use axum::{body::Bytes, extract::State, http::StatusCode, routing::post, Json, Router};
use prediction_orchestrator::TrainingAck;
use serde::Deserialize;

use crate::{AppError, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct TrainRequest {
    pub market: Option<String>,
    #[serde(default)]
    pub force: bool,
}

pub fn model_routes() -> Router<AppState> {
    Router::new().route("/api/models/train", post(train_models))
}

/// POST /api/models/train. Acknowledges only; models are fit per request.
async fn train_models(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<TrainingAck>), AppError> {
    let request: TrainRequest = if body.iter().all(u8::is_ascii_whitespace) {
        TrainRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::bad_request(format!("Invalid JSON body: {}", e)))?
    };

    let market = request
        .market
        .as_deref()
        .map(str::parse::<Market>)
        .transpose()
        .map_err(|_| AppError::bad_request("Invalid market"))?;

    Ok((StatusCode::ACCEPTED, Json(state.service.train(market, request.force))))
}
