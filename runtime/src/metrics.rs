//! Prometheus export for the store metrics.
//!
//! The store always emits its metrics through the `metrics` facade; nothing
//! is recorded until a recorder is installed. [`install_recorder`] installs
//! a Prometheus recorder and returns the handle used to render a snapshot.
//!
//! # Metrics
//!
//! - `store.commands.total`: actions sent to any store
//! - `store.effects.executed`: effects run, labelled by `type`
//! - `store.reducer.duration_seconds`: time spent in reducers
//! - `store.shutdown.rejected_actions`: actions refused during shutdown
//!
//! # Example
//!
//! ```rust,no_run
//! use storefront_runtime::metrics;
//!
//! # fn example() -> Result<(), metrics::MetricsError> {
//! let handle = metrics::install_recorder()?;
//! // ... run commands ...
//! eprint!("{}", handle.render());
//! # Ok(())
//! # }
//! ```

use ::metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusRecorder};
use thiserror::Error;

pub use metrics_exporter_prometheus::PrometheusHandle;

/// Errors from metrics setup
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build the exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install the global recorder
    #[error("Failed to install metrics recorder: {0}")]
    Install(String),
}

/// Build a Prometheus recorder without installing it.
///
/// Latency histograms (`*duration_seconds`) get sub-second buckets.
///
/// # Errors
///
/// Returns [`MetricsError::Build`] if the bucket configuration is rejected.
pub fn build_recorder() -> Result<PrometheusRecorder, MetricsError> {
    let recorder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0],
        )
        .map_err(|e| MetricsError::Build(e.to_string()))?
        .build_recorder();
    Ok(recorder)
}

/// Install the Prometheus recorder process-wide.
///
/// # Errors
///
/// Returns [`MetricsError::Install`] if a recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, MetricsError> {
    let recorder = build_recorder()?;
    let handle = recorder.handle();
    ::metrics::set_global_recorder(recorder).map_err(|e| MetricsError::Install(e.to_string()))?;
    describe_metrics();
    tracing::debug!("Metrics recorder installed");
    Ok(handle)
}

fn describe_metrics() {
    describe_counter!("store.commands.total", "Actions sent to a store");
    describe_counter!("store.effects.executed", "Effects executed, by type");
    describe_histogram!(
        "store.reducer.duration_seconds",
        "Time spent running reducers"
    );
    describe_counter!(
        "store.shutdown.rejected_actions",
        "Actions refused because the store was shutting down"
    );
}
