//! Activity Recognition API Server
//!
//! REST API for sensor ingestion, activity records, device registration and
//! fall location alerts.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_governor::GovernorLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub mod error;
pub mod rate_limit;
mod routes;
pub mod settings;

pub use error::ApiError;
pub use rate_limit::RateLimitConfig;
pub use routes::predict::{PredictRequest, PredictResponse};
pub use routes::records::RecordsResponse;
pub use routes::subjects::MessageResponse;
pub use settings::{LoggingSettings, Settings};

use activity_pipeline::ActivityPipeline;
use alerting::{ActivityEvent, NotificationSink};
use storage::Repository;

/// Application state shared across handlers
pub struct AppState {
    pub pipeline: Arc<ActivityPipeline>,
    pub repository: Arc<Repository>,
    /// Transport for notifications sent straight from a request
    pub sink: Arc<dyn NotificationSink>,
    /// Channel to the daily sweep
    pub events: Option<mpsc::Sender<ActivityEvent>>,
    /// Prometheus renderer, absent when no recorder is installed
    pub metrics: Option<PrometheusHandle>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Create new application state
    pub fn new(
        pipeline: Arc<ActivityPipeline>,
        repository: Arc<Repository>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            pipeline,
            repository,
            sink,
            events: None,
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn with_events(mut self, events: mpsc::Sender<ActivityEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: i64,
    pub version: String,
    pub uptime_seconds: u64,
    pub counts: SystemCounts,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemCounts {
    /// Subjects with live sequence state
    pub active_subjects: usize,
    /// Subjects with a stored profile
    pub profiles: usize,
    pub day_documents: usize,
    pub locations: usize,
}

/// Create the application router
pub fn create_router(state: SharedState, rate_limit: &RateLimitConfig) -> Router {
    let mut alerting: Router<SharedState> = Router::new()
        .route("/api/v1/device-token", post(routes::subjects::register_device_token))
        .route("/api/v1/location", post(routes::subjects::location_alert));
    match rate_limit::create_governor_config(rate_limit) {
        Some(config) => alerting = alerting.layer(GovernorLayer { config }),
        None => warn!("Rate limiting disabled: invalid limits {:?}", rate_limit),
    }

    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/predict", post(routes::predict::predict))
        .route("/api/v1/records", get(routes::records::get_records))
        .route("/metrics", get(metrics_handler))
        .merge(alerting)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().timestamp(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        counts: SystemCounts {
            active_subjects: state.pipeline.subjects().len(),
            profiles: state.repository.subject_count(),
            day_documents: state.repository.document_count(),
            locations: state.repository.location_count(),
        },
    })
}

/// Prometheus text exposition
async fn metrics_handler(State(state): State<SharedState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed".to_string()),
    }
}

/// Initialize logging. RUST_LOG takes precedence over the configured level.
pub fn init_logging(settings: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let result = if settings.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}

/// Serve `router` on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("Starting API server on {}", listener.local_addr()?);
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::LogSink;
    use axum::body::Body;
    use axum::http::Request;
    use data_validator::StandardScaler;
    use feature_engine::FEATURE_DIMENSION;
    use inference_engine::{ActivityType, MockClassifier};
    use tower::ServiceExt;

    fn router() -> Router {
        let pipeline = ActivityPipeline::new(
            activity_pipeline::PipelineConfig::default(),
            Arc::new(StandardScaler::identity(FEATURE_DIMENSION)),
            Arc::new(MockClassifier::constant(ActivityType::Sit, 3, FEATURE_DIMENSION)),
        )
        .unwrap();
        let state = AppState::new(Arc::new(pipeline), Arc::new(Repository::new()), Arc::new(LogSink));
        create_router(Arc::new(state), &RateLimitConfig::default())
    }

    #[tokio::test]
    async fn test_metrics_without_recorder() {
        let response = router()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_records_defaults_to_today() {
        let response = router()
            .oneshot(Request::get("/api/v1/records").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: RecordsResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.subject_id, "default");
        assert_eq!(body.date, chrono::Utc::now().date_naive());
        assert_eq!(body.count, 0);
    }
}
