//! Normalize Phase Metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

/// Metrics collection for the TextNormalizer
pub struct NormalizeMetrics;

impl NormalizeMetrics {
    /// Record a successful normalization and the acronym mappings it found
    pub fn record_normalized(mappings_found: usize) {
        ::metrics::counter!(phase_metric!(counter, "normalize", "names")).increment(1);
        ::metrics::counter!(phase_metric!(counter, "normalize", "acronym_mappings"))
            .increment(mappings_found as u64);
    }

    /// Record an input rejected by validation
    pub fn record_rejected() {
        ::metrics::counter!(phase_metric!(counter, "normalize", "rejected")).increment(1);
    }

    /// Record a bare acronym resolved through the lookup callback
    pub fn record_acronym_expanded() {
        ::metrics::counter!(phase_metric!(counter, "normalize", "acronyms_expanded")).increment(1);
    }
}

impl PhaseMetrics for NormalizeMetrics {
    fn register_metrics() {
        use metrics::counter;

        let _ = counter!(phase_metric!(counter, "normalize", "names"));
        let _ = counter!(phase_metric!(counter, "normalize", "acronym_mappings"));
        let _ = counter!(phase_metric!(counter, "normalize", "rejected"));
        let _ = counter!(phase_metric!(counter, "normalize", "acronyms_expanded"));
    }

    fn phase_name() -> &'static str {
        "normalize"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "normalize", "names"),
                metric_type: MetricType::Counter,
                help: "Venue names normalized",
            },
            MetricDoc {
                name: phase_metric!(counter, "normalize", "acronym_mappings"),
                metric_type: MetricType::Counter,
                help: "Acronym to full-name mappings extracted from venue names",
            },
            MetricDoc {
                name: phase_metric!(counter, "normalize", "rejected"),
                metric_type: MetricType::Counter,
                help: "Venue names rejected as empty or over-length",
            },
            MetricDoc {
                name: phase_metric!(counter, "normalize", "acronyms_expanded"),
                metric_type: MetricType::Counter,
                help: "Bare acronyms expanded through the acronym lookup",
            },
        ]
    }
}
