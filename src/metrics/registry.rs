//! Metrics registry for coordinating phase-specific metrics
//!
//! Registers every phase's metrics with the recorder and detects naming
//! conflicts early.

use crate::metrics::{MetricDoc, MetricType, PhaseMetrics};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Register all metrics from all phases
pub fn register_all_metrics() {
    let mut all_metrics = HashMap::new();

    register_phase_metrics::<super::normalize::NormalizeMetrics>(&mut all_metrics);
    register_phase_metrics::<super::batch::BatchMetrics>(&mut all_metrics);
    register_phase_metrics::<super::store::StoreMetrics>(&mut all_metrics);

    info!(
        "Registered {} total metrics across all phases",
        all_metrics.len()
    );
}

/// Register metrics for a specific phase and detect conflicts
fn register_phase_metrics<T: PhaseMetrics>(all_metrics: &mut HashMap<String, MetricDoc>) {
    T::register_metrics();
    let phase_name = T::phase_name();

    for doc in T::metrics_documentation() {
        describe(&doc);
        if extract_phase_from_metric_name(doc.name) != phase_name {
            warn!("Metric '{}' is not prefixed with its phase '{}'", doc.name, phase_name);
        }
        if let Some(existing) = all_metrics.get(doc.name) {
            warn!(
                "Metric name conflict detected: '{}' ({}) redefined by phase '{}'",
                doc.name, existing.help, phase_name
            );
        } else {
            debug!("Registered metric {} for phase '{}'", doc.name, phase_name);
            all_metrics.insert(doc.name.to_string(), doc);
        }
    }
}

fn describe(doc: &MetricDoc) {
    match doc.metric_type {
        MetricType::Counter => ::metrics::describe_counter!(doc.name, doc.help),
        MetricType::Histogram => ::metrics::describe_histogram!(doc.name, doc.help),
        MetricType::Gauge => ::metrics::describe_gauge!(doc.name, doc.help),
    }
}

/// Extract phase name from metric name (e.g., "venue_batch_files_total" -> "batch")
pub fn extract_phase_from_metric_name(metric_name: &str) -> &str {
    if let Some(stripped) = metric_name.strip_prefix("venue_") {
        if let Some(next_underscore) = stripped.find('_') {
            return &stripped[..next_underscore];
        }
    }
    "unknown"
}
