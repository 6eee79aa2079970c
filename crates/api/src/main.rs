//! Activity Recognition Service - Main Entry Point

use activity_pipeline::ActivityPipeline;
use alerting::{DailySweep, LogSink, NotificationSink};
use anyhow::Context;
use chrono::Utc;
use api::{create_router, init_logging, serve, AppState, Settings};
use data_validator::{FeatureNormalizer, StandardScaler};
use feature_engine::FEATURE_DIMENSION;
use inference_engine::{ActivityClassifier, ActivityType, MockClassifier, OnnxClassifier};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::path::Path;
use std::sync::Arc;
use storage::Repository;
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading settings")?;
    init_logging(&settings.logging);

    info!("=== Activity Service v{} ===", env!("CARGO_PKG_VERSION"));

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("installing metrics recorder")?;

    let normalizer: Arc<dyn FeatureNormalizer> = match &settings.models.scaler_path {
        Some(path) => Arc::new(StandardScaler::load(path, FEATURE_DIMENSION)?),
        None => {
            warn!("No scaler configured, features are passed through unscaled");
            Arc::new(StandardScaler::identity(FEATURE_DIMENSION))
        }
    };

    let sequence_length = settings.pipeline.sequence_length;
    let classifier: Arc<dyn ActivityClassifier> = match &settings.models.model_path {
        Some(path) => Arc::new(OnnxClassifier::load(path, sequence_length, FEATURE_DIMENSION)?),
        None => {
            warn!("No model configured, using mock classifier");
            Arc::new(MockClassifier::constant(ActivityType::Sit, sequence_length, FEATURE_DIMENSION))
        }
    };

    let repository = Arc::new(load_repository(settings.storage.snapshot_path.as_deref())?);
    let sink: Arc<dyn NotificationSink> = Arc::new(LogSink);

    let (events, sweep) = DailySweep::channel(settings.pipeline.event_buffer, settings.alerting.clone(), sink.clone());
    let sweep = sweep.with_repository(repository.clone());
    let pipeline = Arc::new(
        ActivityPipeline::new(settings.pipeline.clone(), normalizer, classifier)?
            .with_repository(repository.clone())
            .with_events(events.clone()),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep_handle = tokio::spawn(sweep.run(shutdown_rx.clone()));
    let maintenance_handle = tokio::spawn(maintenance(
        pipeline.clone(),
        repository.clone(),
        settings.storage.retention_days,
        shutdown_rx,
    ));

    let state = Arc::new(
        AppState::new(pipeline, repository.clone(), sink)
            .with_events(events)
            .with_metrics(metrics),
    );
    let router = create_router(state, &settings.server.rate_limit);

    let listener = tokio::net::TcpListener::bind(&settings.server.bind)
        .await
        .with_context(|| format!("binding {}", settings.server.bind))?;
    serve(listener, router, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
        }
        info!("Shutdown requested");
    })
    .await?;

    let _ = shutdown_tx.send(true);
    sweep_handle.await?;
    maintenance_handle.await?;

    if let Some(path) = &settings.storage.snapshot_path {
        std::fs::write(path, repository.snapshot()?).with_context(|| format!("writing snapshot {}", path))?;
        info!("Repository snapshot written to {}", path);
    }

    info!("Activity service stopped");
    Ok(())
}

/// Restore the repository from its snapshot when one exists
fn load_repository(snapshot_path: Option<&str>) -> anyhow::Result<Repository> {
    match snapshot_path {
        Some(path) if Path::new(path).exists() => {
            let bytes = std::fs::read(path).with_context(|| format!("reading snapshot {}", path))?;
            Ok(Repository::restore(&bytes)?)
        }
        _ => Ok(Repository::new()),
    }
}

/// Periodically drop idle subject state and day documents past retention
async fn maintenance(
    pipeline: Arc<ActivityPipeline>,
    repository: Arc<Repository>,
    retention_days: i64,
    mut shutdown: watch::Receiver<bool>,
) {
    let period = (pipeline.config().idle_timeout() / 4).max(std::time::Duration::from_secs(1));
    let mut ticker = tokio::time::interval(period);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                pipeline.evict_idle();
                let cutoff = Utc::now().date_naive() - chrono::Duration::days(retention_days.max(0));
                if let Err(e) = repository.prune_before(cutoff) {
                    warn!("Pruning day documents failed: {}", e);
                }
            }
        }
    }
}
