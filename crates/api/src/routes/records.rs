//! Activity Record Routes

use axum::extract::{Query, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use inference_engine::ActivityRecord;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::SharedState;

/// Query parameters for the records endpoint
#[derive(Debug, Deserialize)]
pub struct RecordsQuery {
    pub subject_id: Option<String>,
    /// YYYY-MM-DD, defaults to today (UTC)
    pub date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordsResponse {
    pub subject_id: String,
    pub date: NaiveDate,
    pub records: Vec<ActivityRecord>,
    pub count: usize,
    pub is_fall: bool,
}

/// Records stored for one subject-day
pub async fn get_records(
    State(state): State<SharedState>,
    Query(params): Query<RecordsQuery>,
) -> Result<Json<RecordsResponse>, ApiError> {
    let subject = state
        .pipeline
        .config()
        .subject_or_default(params.subject_id.as_deref());

    let date = match params.date.as_deref() {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| ApiError::BadRequest(format!("Invalid date '{}', expected YYYY-MM-DD", raw)))?,
        None => Utc::now().date_naive(),
    };

    let records = state
        .repository
        .day_document(&subject, date)?
        .map(|document| document.records)
        .unwrap_or_default();
    let is_fall = state
        .repository
        .profile(&subject)?
        .is_some_and(|profile| profile.is_fall);

    Ok(Json(RecordsResponse {
        subject_id: subject.to_string(),
        date,
        count: records.len(),
        records,
        is_fall,
    }))
}
