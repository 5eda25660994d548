use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::io::BufReader;
use torsync_config::AppConfig;
use torsync_data::{PgTorrentStore, TorrentStore};
use torsync_sync::Synchronizer;
use torsync_telemetry::{LogFormat, LoggingConfig, Metrics, init_logging};
use tracing::{debug, info, warn};

use crate::bridge::{BridgeSummary, pump_events};
use crate::error::{AppError, AppResult};

/// Entry point for the torsync boot sequence.
///
/// # Errors
///
/// Returns an error if configuration, logging, the database connection, or
/// the synchronizer lifecycle fails.
pub async fn run_app() -> AppResult<()> {
    let config = AppConfig::from_env().map_err(|err| AppError::config("config.from_env", err))?;

    let logging = LoggingConfig {
        level: &config.log_level,
        format: config
            .log_format
            .as_deref()
            .map_or_else(LogFormat::infer, LogFormat::from_name),
        build_sha: option_env!("TORSYNC_BUILD_SHA").unwrap_or("dev"),
    };
    init_logging(&logging).map_err(|err| AppError::telemetry("telemetry.init", err))?;
    info!(
        max_connections = config.max_connections,
        log_changes = config.sync.log_changes,
        "torsync bootstrap starting"
    );

    let metrics = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|err| AppError::database("pool.connect", err))?;
    let store = PgTorrentStore::new(pool)
        .await
        .map_err(|err| AppError::data("store.new", err))?;
    info!("database schema ready");

    let store: Arc<dyn TorrentStore> = Arc::new(store);
    let mut sync = Synchronizer::new(store, config.sync.clone(), metrics.clone());
    let handle = sync
        .start()
        .map_err(|err| AppError::sync("synchronizer.start", err))?;

    let stdin = BufReader::new(tokio::io::stdin());
    let pumped = tokio::select! {
        result = pump_events(stdin, &handle) => result,
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                warn!(error = %err, "ctrl-c listener failed");
            }
            info!("interrupt received");
            Ok(BridgeSummary::default())
        }
    };

    let stopped = sync
        .stop()
        .await
        .map_err(|err| AppError::sync("synchronizer.stop", err));

    if let Some(report) = final_metrics_report(&metrics) {
        debug!(metrics = %report, "final metrics");
    }
    let summary = pumped?;
    stopped?;
    info!(
        accepted = summary.accepted,
        skipped = summary.skipped,
        pending = metrics.snapshot().pending_torrents,
        "torsync shutdown complete"
    );
    Ok(())
}

/// Prometheus text for the registry, or `None` when it cannot be rendered.
fn final_metrics_report(metrics: &Metrics) -> Option<String> {
    match metrics.render() {
        Ok(report) => Some(report),
        Err(err) => {
            warn!(error = %err, "metrics could not be rendered");
            None
        }
    }
}
