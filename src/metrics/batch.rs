//! Batch Phase Metrics
//!
//! Stage 1 file extraction and Stage 2 merge outcomes.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

/// Metrics collection for the BatchAcronymProcessor
pub struct BatchMetrics;

impl BatchMetrics {
    /// Record one file processed by a Stage 1 worker
    pub fn record_file_processed(entries: usize, duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "batch", "files_processed")).increment(1);
        ::metrics::counter!(phase_metric!(counter, "batch", "entries")).increment(entries as u64);
        ::metrics::histogram!(phase_metric!(histogram, "batch", "file_duration_seconds"))
            .record(duration_secs);
    }

    /// Record a file whose parse or read failed
    pub fn record_file_error() {
        ::metrics::counter!(phase_metric!(counter, "batch", "file_errors")).increment(1);
    }

    /// Record the classification totals of one Stage 2 merge
    pub fn record_merge(new: usize, existing: usize, conflicts: usize, duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "batch", "new_acronyms")).increment(new as u64);
        ::metrics::counter!(phase_metric!(counter, "batch", "existing_acronyms"))
            .increment(existing as u64);
        ::metrics::counter!(phase_metric!(counter, "batch", "conflicts")).increment(conflicts as u64);
        ::metrics::histogram!(phase_metric!(histogram, "batch", "merge_duration_seconds"))
            .record(duration_secs);
    }

    /// Record the size of the Stage 1 worker pool
    pub fn record_pool_size(workers: usize) {
        ::metrics::gauge!(phase_metric!(gauge, "batch", "workers")).set(workers as f64);
    }
}

impl PhaseMetrics for BatchMetrics {
    fn register_metrics() {
        use metrics::{counter, gauge, histogram};

        let _ = counter!(phase_metric!(counter, "batch", "files_processed"));
        let _ = counter!(phase_metric!(counter, "batch", "entries"));
        let _ = counter!(phase_metric!(counter, "batch", "file_errors"));
        let _ = counter!(phase_metric!(counter, "batch", "new_acronyms"));
        let _ = counter!(phase_metric!(counter, "batch", "existing_acronyms"));
        let _ = counter!(phase_metric!(counter, "batch", "conflicts"));
        let _ = histogram!(phase_metric!(histogram, "batch", "file_duration_seconds"));
        let _ = histogram!(phase_metric!(histogram, "batch", "merge_duration_seconds"));
        let _ = gauge!(phase_metric!(gauge, "batch", "workers"));
    }

    fn phase_name() -> &'static str {
        "batch"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "batch", "files_processed"),
                metric_type: MetricType::Counter,
                help: "Files processed by Stage 1 workers",
            },
            MetricDoc {
                name: phase_metric!(counter, "batch", "entries"),
                metric_type: MetricType::Counter,
                help: "Bibliography entries read by Stage 1 workers",
            },
            MetricDoc {
                name: phase_metric!(counter, "batch", "file_errors"),
                metric_type: MetricType::Counter,
                help: "Files that failed to read or parse",
            },
            MetricDoc {
                name: phase_metric!(counter, "batch", "new_acronyms"),
                metric_type: MetricType::Counter,
                help: "Acronym groups classified as new by the merge",
            },
            MetricDoc {
                name: phase_metric!(counter, "batch", "existing_acronyms"),
                metric_type: MetricType::Counter,
                help: "Acronym groups matching an existing store variant",
            },
            MetricDoc {
                name: phase_metric!(counter, "batch", "conflicts"),
                metric_type: MetricType::Counter,
                help: "Acronym groups with irreconcilable names",
            },
            MetricDoc {
                name: phase_metric!(histogram, "batch", "file_duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Stage 1 processing time per file in seconds",
            },
            MetricDoc {
                name: phase_metric!(histogram, "batch", "merge_duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Stage 2 merge duration in seconds",
            },
            MetricDoc {
                name: phase_metric!(gauge, "batch", "workers"),
                metric_type: MetricType::Gauge,
                help: "Size of the most recent Stage 1 worker pool",
            },
        ]
    }
}
