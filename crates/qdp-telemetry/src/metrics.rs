//! Prometheus metrics for the QDP trading channel.
//!
//! # Panics
//!
//! Each metric registers with the default registry on first use and panics
//! if the name is already taken.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, register_int_gauge,
    CounterVec, Encoder, GaugeVec, HistogramVec, IntGauge, TextEncoder,
};

use crate::error::TelemetryResult;

/// Session state (1 = active, 0 = inactive).
/// Labels: state (not_logged_in/authenticating/logged_in/login_failed/ready)
pub static SESSION_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "qdp_session_state",
        "Trading session state (1=active, 0=inactive)",
        &["state"]
    )
    .unwrap()
});

/// Login attempts by outcome.
pub static LOGIN_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("qdp_login_total", "Login results", &["result"]).unwrap()
});

/// Order submissions by outcome (sent/rejected/send_failed).
pub static ORDERS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("qdp_orders_total", "Order submissions", &["result"]).unwrap()
});

/// Cancel requests by outcome.
pub static CANCELS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("qdp_cancels_total", "Cancel requests", &["result"]).unwrap()
});

/// Query lifecycle events.
/// Labels: kind (account/positions/orders/trades), event
pub static QUERIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "qdp_queries_total",
        "Query dispatcher events",
        &["kind", "event"]
    )
    .unwrap()
});

/// Queries waiting in the dispatcher.
pub static QUERY_QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("qdp_query_queue_depth", "Queries waiting for dispatch").unwrap()
});

/// Time from dispatch to terminal record.
pub static QUERY_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "qdp_query_latency_ms",
        "Query round trip in milliseconds",
        &["kind"],
        vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0, 30000.0]
    )
    .unwrap()
});

/// Business errors reported by the gateway.
pub static BUSINESS_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "qdp_business_errors_total",
        "Nonzero error codes on gateway responses",
        &["source"]
    )
    .unwrap()
});

/// Records dropped by the translator (unknown contract, bad id).
pub static RECORDS_DROPPED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "qdp_records_dropped_total",
        "Gateway records that could not be translated",
        &["record"]
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Set the active session state; all others go to 0.
    pub fn session_state_set(state: &str) {
        for s in &[
            "not_logged_in",
            "authenticating",
            "logged_in",
            "login_failed",
            "ready",
        ] {
            SESSION_STATE.with_label_values(&[s]).set(0.0);
        }
        SESSION_STATE.with_label_values(&[state]).set(1.0);
    }

    pub fn login_result(success: bool) {
        let result = if success { "success" } else { "failed" };
        LOGIN_TOTAL.with_label_values(&[result]).inc();
    }

    pub fn order_sent() {
        ORDERS_TOTAL.with_label_values(&["sent"]).inc();
    }

    /// Refused locally before anything was sent.
    pub fn order_rejected(reason: &str) {
        ORDERS_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn order_send_failed() {
        ORDERS_TOTAL.with_label_values(&["send_failed"]).inc();
    }

    pub fn cancel(result: &str) {
        CANCELS_TOTAL.with_label_values(&[result]).inc();
    }

    pub fn query_enqueued(kind: &str) {
        QUERIES_TOTAL.with_label_values(&[kind, "enqueued"]).inc();
    }

    pub fn query_dispatched(kind: &str) {
        QUERIES_TOTAL.with_label_values(&[kind, "dispatched"]).inc();
    }

    pub fn query_send_failed(kind: &str) {
        QUERIES_TOTAL.with_label_values(&[kind, "send_failed"]).inc();
    }

    pub fn query_completed(kind: &str, latency_ms: f64) {
        QUERIES_TOTAL.with_label_values(&[kind, "completed"]).inc();
        QUERY_LATENCY_MS.with_label_values(&[kind]).observe(latency_ms);
    }

    pub fn query_timed_out(kind: &str) {
        QUERIES_TOTAL.with_label_values(&[kind, "timed_out"]).inc();
    }

    /// Response rows of a query that is no longer pending.
    pub fn query_stale_response(kind: &str) {
        QUERIES_TOTAL.with_label_values(&[kind, "stale_response"]).inc();
    }

    pub fn query_discarded(kind: &str) {
        QUERIES_TOTAL.with_label_values(&[kind, "discarded"]).inc();
    }

    pub fn query_queue_depth(depth: usize) {
        QUERY_QUEUE_DEPTH.set(depth as i64);
    }

    pub fn business_error(source: &str) {
        BUSINESS_ERRORS_TOTAL.with_label_values(&[source]).inc();
    }

    pub fn record_dropped(record: &str) {
        RECORDS_DROPPED_TOTAL.with_label_values(&[record]).inc();
    }

    /// Encode the default registry in the Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}
