//! Store Phase Metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

/// Metrics collection for the acronym store
pub struct StoreMetrics;

impl StoreMetrics {
    pub fn record_variant_write() {
        ::metrics::counter!(phase_metric!(counter, "store", "variant_writes")).increment(1);
    }

    pub fn record_learned_upsert() {
        ::metrics::counter!(phase_metric!(counter, "store", "learned_upserts")).increment(1);
    }

    pub fn record_lookup(hit: bool) {
        if hit {
            ::metrics::counter!(phase_metric!(counter, "store", "lookup_hits")).increment(1);
        } else {
            ::metrics::counter!(phase_metric!(counter, "store", "lookup_misses")).increment(1);
        }
    }

    pub fn record_marked_ambiguous() {
        ::metrics::counter!(phase_metric!(counter, "store", "marked_ambiguous")).increment(1);
    }
}

impl PhaseMetrics for StoreMetrics {
    fn register_metrics() {
        use metrics::counter;

        let _ = counter!(phase_metric!(counter, "store", "variant_writes"));
        let _ = counter!(phase_metric!(counter, "store", "learned_upserts"));
        let _ = counter!(phase_metric!(counter, "store", "lookup_hits"));
        let _ = counter!(phase_metric!(counter, "store", "lookup_misses"));
        let _ = counter!(phase_metric!(counter, "store", "marked_ambiguous"));
    }

    fn phase_name() -> &'static str {
        "store"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "store", "variant_writes"),
                metric_type: MetricType::Counter,
                help: "Acronym variant inserts and usage updates",
            },
            MetricDoc {
                name: phase_metric!(counter, "store", "learned_upserts"),
                metric_type: MetricType::Counter,
                help: "Learned abbreviation inserts and reinforcements",
            },
            MetricDoc {
                name: phase_metric!(counter, "store", "lookup_hits"),
                metric_type: MetricType::Counter,
                help: "Acronym lookups that resolved to a canonical name",
            },
            MetricDoc {
                name: phase_metric!(counter, "store", "lookup_misses"),
                metric_type: MetricType::Counter,
                help: "Acronym lookups that were absent or ambiguous",
            },
            MetricDoc {
                name: phase_metric!(counter, "store", "marked_ambiguous"),
                metric_type: MetricType::Counter,
                help: "Acronym groups flagged as ambiguous",
            },
        ]
    }
}
