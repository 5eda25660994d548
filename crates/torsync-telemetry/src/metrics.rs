//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes only the counters and gauges the synchronizer updates.

use std::sync::Arc;
use std::time::Duration;

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{MetricStage, Result, TelemetryError};

/// Result label recorded for each commit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Every staged write landed.
    Succeeded,
    /// A statement failed; the cycle will be retried after backoff.
    Failed,
    /// The connection check failed before any statement ran.
    Deferred,
}

impl CycleOutcome {
    const fn label(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Deferred => "deferred",
        }
    }
}

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    commit_cycles_total: IntCounterVec,
    store_operations_total: IntCounterVec,
    pending_torrents: IntGauge,
    tracked_torrents: IntGauge,
    commit_interval_ms: IntGauge,
}

/// Snapshot of selected gauges for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Torrents waiting for their first insert.
    pub pending_torrents: i64,
    /// Torrents with a known surrogate id.
    pub tracked_torrents: i64,
    /// Current commit interval in milliseconds.
    pub commit_interval_ms: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be built or
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let commit_cycles_total = IntCounterVec::new(
            Opts::new("commit_cycles_total", "Commit cycles executed by outcome"),
            &["outcome"],
        )
        .map_err(TelemetryError::metric(
            "commit_cycles_total",
            MetricStage::Build,
        ))?;
        let store_operations_total = IntCounterVec::new(
            Opts::new(
                "store_operations_total",
                "Writer operations issued against the database",
            ),
            &["operation"],
        )
        .map_err(TelemetryError::metric(
            "store_operations_total",
            MetricStage::Build,
        ))?;
        let pending_torrents = gauge("pending_torrents", "Torrents awaiting their first insert")?;
        let tracked_torrents = gauge("tracked_torrents", "Torrents with a known surrogate id")?;
        let commit_interval_ms = gauge("commit_interval_ms", "Current commit interval (ms)")?;

        register(&registry, "commit_cycles_total", commit_cycles_total.clone())?;
        register(
            &registry,
            "store_operations_total",
            store_operations_total.clone(),
        )?;
        register(&registry, "pending_torrents", pending_torrents.clone())?;
        register(&registry, "tracked_torrents", tracked_torrents.clone())?;
        register(&registry, "commit_interval_ms", commit_interval_ms.clone())?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                commit_cycles_total,
                store_operations_total,
                pending_torrents,
                tracked_torrents,
                commit_interval_ms,
            }),
        })
    }

    /// Count a finished commit cycle.
    pub fn inc_commit_cycle(&self, outcome: CycleOutcome) {
        self.inner
            .commit_cycles_total
            .with_label_values(&[outcome.label()])
            .inc();
    }

    /// Count a writer operation.
    pub fn inc_store_operation(&self, operation: &str) {
        self.inner
            .store_operations_total
            .with_label_values(&[operation])
            .inc();
    }

    /// Set the pending torrent gauge.
    pub fn set_pending_torrents(&self, count: usize) {
        self.inner
            .pending_torrents
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Set the tracked torrent gauge.
    pub fn set_tracked_torrents(&self, count: usize) {
        self.inner
            .tracked_torrents
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Record the interval until the next commit cycle.
    pub fn observe_commit_interval(&self, interval: Duration) {
        self.inner
            .commit_interval_ms
            .set(Self::duration_to_ms(interval));
    }

    /// Total cycles recorded with `outcome`.
    #[must_use]
    pub fn commit_cycles(&self, outcome: CycleOutcome) -> u64 {
        self.inner
            .commit_cycles_total
            .with_label_values(&[outcome.label()])
            .get()
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::Render { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::RenderUtf8 { source })
    }

    /// Take a point-in-time snapshot of the gauges.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pending_torrents: self.inner.pending_torrents.get(),
            tracked_torrents: self.inner.tracked_torrents.get(),
            commit_interval_ms: self.inner.commit_interval_ms.get(),
        }
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

fn gauge(name: &'static str, help: &str) -> Result<IntGauge> {
    IntGauge::with_opts(Opts::new(name, help))
        .map_err(TelemetryError::metric(name, MetricStage::Build))
}

fn register<C>(registry: &Registry, name: &'static str, collector: C) -> Result<()>
where
    C: prometheus::core::Collector + 'static,
{
    registry
        .register(Box::new(collector))
        .map_err(TelemetryError::metric(name, MetricStage::Register))
}
