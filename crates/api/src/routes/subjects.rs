//! Device and location routes

use alerting::{ActivityEvent, DeliveryTarget, Notification};
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use storage::StorageError;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::SharedState;

#[derive(Debug, Deserialize)]
pub struct DeviceTokenRequest {
    pub subject_id: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    pub subject_id: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Register the push token notifications for a subject go to
pub async fn register_device_token(
    State(state): State<SharedState>,
    Json(request): Json<DeviceTokenRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let token = match request.token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => token.to_string(),
        _ => return Err(ApiError::BadRequest("Missing device token".to_string())),
    };
    let subject = state
        .pipeline
        .config()
        .subject_or_default(request.subject_id.as_deref());

    state.repository.set_device_token(&subject, &token)?;
    if let Some(events) = &state.events {
        if events.send(ActivityEvent::DeviceRegistered { subject, token }).await.is_err() {
            warn!("Sweep stopped, device registration not forwarded");
        }
    }

    Ok(Json(MessageResponse {
        message: "Device token registered successfully".to_string(),
        id: None,
    }))
}

/// Store a reported position and push a fall alert carrying it
pub async fn location_alert(
    State(state): State<SharedState>,
    Json(request): Json<LocationRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let (latitude, longitude) = match (request.latitude, request.longitude) {
        (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => (lat, lon),
        _ => return Err(ApiError::BadRequest("Missing latitude or longitude".to_string())),
    };
    let subject = state
        .pipeline
        .config()
        .subject_or_default(request.subject_id.as_deref());

    let now = Utc::now();
    let location = state.repository.insert_location(&subject, latitude, longitude, now)?;

    let token = match state.repository.device_token(&subject) {
        Ok(token) => token,
        Err(StorageError::NotFound) => {
            return Err(ApiError::NotFound("User device token not found".to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    let notification = Notification::fall_location(&location.id, subject.as_str(), latitude, longitude, now);
    let target = DeliveryTarget::new(subject.clone(), Some(token));
    state.sink.send(&target, &notification)?;
    metrics::counter!("activity_notifications_total", "kind" => notification.kind.as_str()).increment(1);
    info!("Location alert {} sent for {}", location.id, subject);

    Ok(Json(MessageResponse {
        message: "Location alert sent".to_string(),
        id: Some(location.id),
    }))
}
