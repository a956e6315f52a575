//! Logging and metrics setup.
//!
//! The library only emits `tracing` events and `metrics` samples; binaries
//! decide where they go.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Prometheus handle for on-demand scrape output.
pub type PrometheusHandle = metrics_exporter_prometheus::PrometheusHandle;

/// Install the global tracing subscriber.
///
/// Filtering follows `RUST_LOG`, defaulting to `info`. With `json` set,
/// events are emitted as one JSON object per line.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        tracing::debug!(error = %e, "Tracing subscriber already installed");
    }
}

/// Install the Prometheus recorder and describe the client's metrics.
///
/// No HTTP listener is started; callers render the exposition text with
/// `handle.render()`.
///
/// # Errors
/// Returns an error if a recorder is already installed or building fails.
pub fn init_metrics() -> Result<PrometheusHandle, metrics_exporter_prometheus::BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_client_metrics();
    Ok(handle)
}

/// Installs the recorder, logging instead of failing when one already exists.
#[must_use]
pub fn init_metrics_handle() -> Option<Arc<PrometheusHandle>> {
    match init_metrics() {
        Ok(handle) => Some(Arc::new(handle)),
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder not installed");
            None
        }
    }
}

fn describe_client_metrics() {
    metrics::describe_counter!(
        "http_client_attempts_total",
        "Transport attempts, including retries"
    );
    metrics::describe_counter!("http_client_retries_total", "Attempts scheduled after a retryable failure");
    metrics::describe_counter!("http_client_requests_total", "Completed requests by outcome");
    metrics::describe_histogram!(
        "http_client_request_duration_seconds",
        metrics::Unit::Seconds,
        "End-to-end request time across all attempts"
    );
    metrics::describe_counter!("service_cache_hits_total", "Service reads served from cache");
    metrics::describe_counter!("service_cache_misses_total", "Service reads that went to the network");
}
