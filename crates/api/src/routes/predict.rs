//! Prediction Routes

use axum::extract::State;
use axum::Json;
use inference_engine::ActivityRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::SharedState;

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub subject_id: Option<String>,
    /// Sample list or `{session_id: [samples]}`
    pub data: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub message: String,
    pub results: Vec<ActivityRecord>,
}

/// Classify a batch of IMU samples for one subject
pub async fn predict(
    State(state): State<SharedState>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ApiError> {
    let data = match request.data {
        Some(Value::Null) | None => return Err(ApiError::BadRequest("Missing data".to_string())),
        Some(data) => data,
    };
    let subject = state
        .pipeline
        .config()
        .subject_or_default(request.subject_id.as_deref());

    let pipeline = state.pipeline.clone();
    let outcome = tokio::task::spawn_blocking(move || pipeline.ingest(&subject, &data))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(PredictResponse {
        message: "Predicted".to_string(),
        results: outcome.records,
    }))
}
