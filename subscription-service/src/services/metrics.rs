//! Metrics module for subscription-service.
//! Provides Prometheus metrics for ledger, usage and billing operations.

use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Database query duration histogram
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "subscription_db_query_duration_seconds",
            "Database query duration"
        ),
        &["operation"]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Ledger transitions counter (activate/deactivate/toggle by service kind)
pub static LEDGER_OPERATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Usage events counter
pub static USAGE_EVENTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Billing records counter (computed/adjusted)
pub static BILLING_RECORDS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Audit entries counter
pub static AUDIT_ENTRIES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Error counter for alerting
pub static ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Call once at startup.
pub fn init_metrics() {
    LEDGER_OPERATIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "subscription_ledger_operations_total",
                "Total subscription state transitions by operation and service kind"
            ),
            &["operation", "service_kind"]
        )
        .expect("Failed to register LEDGER_OPERATIONS_TOTAL")
    });

    USAGE_EVENTS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "subscription_usage_events_total",
                "Total usage events by usage kind"
            ),
            &["usage_kind"]
        )
        .expect("Failed to register USAGE_EVENTS_TOTAL")
    });

    BILLING_RECORDS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "subscription_billing_records_total",
                "Total billing computations and adjustments"
            ),
            &["operation"]
        )
        .expect("Failed to register BILLING_RECORDS_TOTAL")
    });

    AUDIT_ENTRIES_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "subscription_audit_entries_total",
                "Total audit entries by action"
            ),
            &["action"]
        )
        .expect("Failed to register AUDIT_ENTRIES_TOTAL")
    });

    ERRORS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "subscription_errors_total",
                "Total errors by type for alerting"
            ),
            &["error_type", "operation"]
        )
        .expect("Failed to register ERRORS_TOTAL")
    });

    // Force initialization of lazy statics
    let _ = &*DB_QUERY_DURATION;
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Failed to convert metrics to string")
}

/// Record a ledger transition.
pub fn record_ledger_operation(operation: &str, service_kind: &str) {
    if let Some(counter) = LEDGER_OPERATIONS_TOTAL.get() {
        counter.with_label_values(&[operation, service_kind]).inc();
    }
}

/// Record a usage event append.
pub fn record_usage_event(usage_kind: &str) {
    if let Some(counter) = USAGE_EVENTS_TOTAL.get() {
        counter.with_label_values(&[usage_kind]).inc();
    }
}

/// Record a billing computation or adjustment.
pub fn record_billing_record(operation: &str) {
    if let Some(counter) = BILLING_RECORDS_TOTAL.get() {
        counter.with_label_values(&[operation]).inc();
    }
}

/// Record an audit entry append.
pub fn record_audit_append(action: &str) {
    if let Some(counter) = AUDIT_ENTRIES_TOTAL.get() {
        counter.with_label_values(&[action]).inc();
    }
}

/// Record an error for alerting.
pub fn record_error(error_type: &str, operation: &str) {
    if let Some(counter) = ERRORS_TOTAL.get() {
        counter.with_label_values(&[error_type, operation]).inc();
    }
}
