//! Prometheus metrics for the toast manager.
//!
//! Counters cover every admission outcome so a dashboard can show how often
//! requests are merged, queued or dropped under pressure.

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, IntCounter,
    IntCounterVec, IntGauge, TextEncoder,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "ara_toast";

lazy_static! {
    // ============================================================================
    // Admission Metrics
    // ============================================================================

    /// Notifications created, by type
    pub static ref TOASTS_CREATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_created_total", METRIC_PREFIX),
        "Total notifications created",
        &["type"]
    ).unwrap();

    /// Requests merged into an existing group
    pub static ref TOASTS_MERGED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_merged_total", METRIC_PREFIX),
        "Total requests merged into an existing notification"
    ).unwrap();

    /// In-place updates
    pub static ref TOASTS_UPDATED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_updated_total", METRIC_PREFIX),
        "Total notification updates"
    ).unwrap();

    /// Requests parked in the wait queue
    pub static ref TOASTS_QUEUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queued_total", METRIC_PREFIX),
        "Total requests placed in the wait queue"
    ).unwrap();

    /// Requests dropped because the queue was full
    pub static ref TOASTS_DROPPED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_dropped_total", METRIC_PREFIX),
        "Total requests dropped because the wait queue was full"
    ).unwrap();

    /// Notifications evicted for a high priority request
    pub static ref TOASTS_EVICTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_evicted_total", METRIC_PREFIX),
        "Total notifications evicted to admit a high priority request"
    ).unwrap();

    // ============================================================================
    // Lifecycle Metrics
    // ============================================================================

    /// Notifications removed, by reason
    pub static ref TOASTS_REMOVED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_removed_total", METRIC_PREFIX),
        "Total notifications removed",
        &["reason"]
    ).unwrap();

    /// Caller callbacks that returned an error
    pub static ref CALLBACK_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_callback_failures_total", METRIC_PREFIX),
        "Total action or close callbacks that failed"
    ).unwrap();

    /// Persistence writes that failed
    pub static ref PERSISTENCE_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_persistence_failures_total", METRIC_PREFIX),
        "Total failed persistence writes"
    ).unwrap();

    /// Currently active notifications
    pub static ref TOASTS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_active", METRIC_PREFIX),
        "Number of active notifications"
    ).unwrap();

    /// Requests currently waiting
    pub static ref TOASTS_WAITING: IntGauge = register_int_gauge!(
        format!("{}_waiting", METRIC_PREFIX),
        "Number of requests in the wait queue"
    ).unwrap();
}

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording toast metrics
pub struct ToastMetrics;

impl ToastMetrics {
    pub fn record_created(kind: &str) {
        TOASTS_CREATED_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn record_merged() {
        TOASTS_MERGED_TOTAL.inc();
    }

    pub fn record_updated() {
        TOASTS_UPDATED_TOTAL.inc();
    }

    pub fn record_queued() {
        TOASTS_QUEUED_TOTAL.inc();
    }

    pub fn record_dropped() {
        TOASTS_DROPPED_TOTAL.inc();
    }

    pub fn record_evicted() {
        TOASTS_EVICTED_TOTAL.inc();
    }

    pub fn record_removed(reason: &str) {
        TOASTS_REMOVED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn record_callback_failure() {
        CALLBACK_FAILURES_TOTAL.inc();
    }

    pub fn record_persistence_failure() {
        PERSISTENCE_FAILURES_TOTAL.inc();
    }

    /// Gauges are process-wide; with several managers they show the last writer
    pub fn set_sizes(active: usize, waiting: usize) {
        TOASTS_ACTIVE.set(active as i64);
        TOASTS_WAITING.set(waiting as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics() {
        // Initialize some metrics first (lazy_static requires first access)
        ToastMetrics::record_created("info");
        ToastMetrics::set_sizes(1, 0);

        let output = encode_metrics().unwrap();
        assert!(output.contains("ara_toast_created_total"));
        assert!(output.contains("ara_toast_active"));
    }

    #[test]
    fn test_admission_metrics() {
        ToastMetrics::record_merged();
        ToastMetrics::record_queued();
        ToastMetrics::record_dropped();
        ToastMetrics::record_evicted();
        ToastMetrics::record_removed("timeout");
        // Just verify no panics
    }
}
