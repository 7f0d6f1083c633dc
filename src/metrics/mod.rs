//! Phase-organized metrics for venue identity resolution
//!
//! Each phase (normalize, batch, store) defines its metrics in a dedicated
//! submodule. Without an installed recorder every macro call is a no-op, so
//! library users and tests need no setup; the CLI installs a Prometheus
//! recorder and renders it on request.

pub mod batch;
pub mod normalize;
pub mod registry;
pub mod store;

pub use batch::BatchMetrics;
pub use normalize::NormalizeMetrics;
pub use store::StoreMetrics;

use std::sync::OnceLock;
use tracing::{info, warn};

static HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder (idempotent)
pub fn init_metrics() {
    if HANDLE.get().is_some() {
        return;
    }
    match metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if HANDLE.set(handle).is_ok() {
                registry::register_all_metrics();
                info!("Prometheus recorder installed");
            }
        }
        Err(e) => {
            warn!("Failed to install Prometheus recorder: {}", e);
        }
    }
}

/// Prometheus text exposition of everything recorded so far, if a recorder
/// was installed through [`init_metrics`].
pub fn render() -> Option<String> {
    HANDLE.get().map(|h| h.render())
}

/// Trait for phase-specific metrics collections
pub trait PhaseMetrics {
    /// Register all metrics for this phase
    fn register_metrics();

    /// Get the phase name for prefixing metrics
    fn phase_name() -> &'static str;

    /// Get documentation for all metrics in this phase
    fn metrics_documentation() -> Vec<MetricDoc>;
}

/// Documentation for a single metric
#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
}

#[derive(Debug, Clone)]
pub enum MetricType {
    Counter,
    Histogram,
    Gauge,
}

/// Macro to create phase-specific metric names with consistent naming:
/// venue_{phase}_{metric_name}[_total]
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("venue_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("venue_", $phase, "_", $name)
    };
    (gauge, $phase:literal, $name:literal) => {
        concat!("venue_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;
