//! Metrics for the ingestion service.
//!
//! Counter names follow Prometheus conventions and go through the `metrics`
//! facade; `GET /metrics` renders whatever the installed recorder has seen.

use std::fmt;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

/// Every metric name used in the system, so call sites never spell raw
/// strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Upstream fetch metrics
    UpstreamRequestsSuccess,
    UpstreamRequestsError,

    // Ingestion pipeline metrics
    IngestPagesProcessed,
    IngestEventsUpserted,
    IngestEventsSkipped,
    IngestVenuesCreated,
    IngestRunsSuccess,
    IngestRunsError,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::UpstreamRequestsSuccess => "mtl_upstream_requests_success_total",
            MetricName::UpstreamRequestsError => "mtl_upstream_requests_error_total",
            MetricName::IngestPagesProcessed => "mtl_ingest_pages_processed_total",
            MetricName::IngestEventsUpserted => "mtl_ingest_events_upserted_total",
            MetricName::IngestEventsSkipped => "mtl_ingest_events_skipped_total",
            MetricName::IngestVenuesCreated => "mtl_ingest_venues_created_total",
            MetricName::IngestRunsSuccess => "mtl_ingest_runs_success_total",
            MetricName::IngestRunsError => "mtl_ingest_runs_error_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Installs the Prometheus recorder. Call once at startup.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    PROMETHEUS_HANDLE.set(handle).ok();
    info!("Metrics system initialized");
    Ok(())
}

/// Current metric values in the Prometheus text format, `None` before
/// `init()` has run.
pub fn render() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

// ============================================================================
// Upstream Fetch Metrics
// ============================================================================

pub mod upstream {
    use super::MetricName;

    /// Record a successful Discovery API request
    pub fn request_success() {
        ::metrics::counter!(MetricName::UpstreamRequestsSuccess.as_str()).increment(1);
    }

    /// Record a failed Discovery API request
    pub fn request_error() {
        ::metrics::counter!(MetricName::UpstreamRequestsError.as_str()).increment(1);
    }
}

// ============================================================================
// Ingestion Pipeline Metrics
// ============================================================================

pub mod ingest {
    use super::MetricName;

    /// Record a fully processed page
    pub fn page_processed() {
        ::metrics::counter!(MetricName::IngestPagesProcessed.as_str()).increment(1);
    }

    /// Record a persisted event
    pub fn event_upserted() {
        ::metrics::counter!(MetricName::IngestEventsUpserted.as_str()).increment(1);
    }

    /// Record an item skipped for lacking an identity key
    pub fn event_skipped() {
        ::metrics::counter!(MetricName::IngestEventsSkipped.as_str()).increment(1);
    }

    /// Record a venue row created during resolution
    pub fn venue_created() {
        ::metrics::counter!(MetricName::IngestVenuesCreated.as_str()).increment(1);
    }

    /// Record a completed ingestion run
    pub fn run_success() {
        ::metrics::counter!(MetricName::IngestRunsSuccess.as_str()).increment(1);
    }

    /// Record an aborted ingestion run
    pub fn run_error() {
        ::metrics::counter!(MetricName::IngestRunsError.as_str()).increment(1);
    }
}
