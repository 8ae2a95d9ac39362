//! Prometheus metrics for observability and monitoring.
//!
//! Wrapped operations and the store record:
//! - Operation starts, successes and failures per operation key
//! - Operation duration per operation key
//! - Actions applied and rejected by the store
//!
//! Nothing is recorded unless a recorder is installed. [`MetricsServer`]
//! installs the Prometheus recorder and renders the exposition text; serving
//! it over HTTP is left to the host application.
//!
//! # Example
//!
//! ```rust,no_run
//! use crud_context_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new();
//! server.start()?;
//!
//! if let Some(text) = server.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Metric names
pub mod names {
    /// Wrapped operation calls started, labelled by `op`
    pub const OPERATIONS_STARTED: &str = "crud_operations_started_total";
    /// Wrapped operation calls that resolved, labelled by `op`
    pub const OPERATIONS_SUCCEEDED: &str = "crud_operations_succeeded_total";
    /// Wrapped operation calls that failed, labelled by `op` and `kind`
    pub const OPERATIONS_FAILED: &str = "crud_operations_failed_total";
    /// Time from invocation to settlement, labelled by `op`
    pub const OPERATION_DURATION: &str = "crud_operation_duration_seconds";
    /// Actions applied by a store
    pub const ACTIONS_PROCESSED: &str = "store_actions_processed_total";
    /// Actions rejected because the store was shut down
    pub const ACTIONS_REJECTED: &str = "store_actions_rejected_total";
}

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder handle.
///
/// Installs the global recorder and renders the current metrics in the
/// Prometheus text format.
#[derive(Default)]
pub struct MetricsServer {
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a metrics server that has not been started
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., by another test) this
    /// succeeds without a handle, and [`render`](Self::render) returns `None`.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        names::OPERATIONS_STARTED,
        "Total number of wrapped operation calls started"
    );
    describe_counter!(
        names::OPERATIONS_SUCCEEDED,
        "Total number of wrapped operation calls that resolved"
    );
    describe_counter!(
        names::OPERATIONS_FAILED,
        "Total number of wrapped operation calls that failed or panicked"
    );
    describe_histogram!(
        names::OPERATION_DURATION,
        "Time from invoking an operation to its settlement"
    );

    describe_counter!(
        names::ACTIONS_PROCESSED,
        "Total number of status actions applied by stores"
    );
    describe_counter!(
        names::ACTIONS_REJECTED,
        "Total number of status actions rejected after shutdown"
    );
}
