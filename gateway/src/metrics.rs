//! # Prometheus Metrics
//!
//! Exposes operational metrics for the gateway. Scraped at `GET /metrics`
//! on the main listener — a USSD gateway is small enough that a separate
//! metrics port buys nothing.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so
//! they do not collide with any default global registry consumers.
//!
//! Request counters are incremented at the webhook boundary and gauges are
//! refreshed from the live stores on each request. Security and settlement
//! counters are fed by the core library through its telemetry hooks
//! ([`sente_core::telemetry::Telemetry`]), which keeps the core free of any
//! metrics dependency.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

use sente_core::telemetry::Telemetry;

/// Holds all Prometheus metric handles for the gateway.
///
/// Clone-friendly (wraps `Arc` internally via prometheus handles) so it can
/// be shared across request handlers and background tasks.
#[derive(Clone)]
pub struct GatewayMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Total number of USSD webhook requests handled.
    pub ussd_requests_total: IntCounter,
    /// Total number of USSD sessions ended with a terminal reply.
    pub ussd_sessions_ended_total: IntCounter,
    /// Total number of PIN attempts that did not match.
    pub pin_failures_total: IntCounter,
    /// Total number of accounts locked after exhausting their attempts.
    pub lockouts_total: IntCounter,
    /// Total number of transfers booked and dispatched to the ledger.
    pub transfers_initiated_total: IntCounter,
    /// Total number of transfers settled successfully.
    pub transfers_settled_total: IntCounter,
    /// Total number of transfers settled as failed.
    pub transfers_failed_total: IntCounter,
    /// Current number of live USSD sessions.
    pub ussd_sessions_active: IntGauge,
    /// Number of registered subscriber accounts.
    pub accounts_registered: IntGauge,
    /// Histogram of webhook handling latency in seconds.
    pub ussd_request_duration_seconds: Histogram,
}

fn int_counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("metric creation");
    registry
        .register(Box::new(counter.clone()))
        .expect("metric registration");
    counter
}

fn int_gauge(registry: &Registry, name: &str, help: &str) -> IntGauge {
    let gauge = IntGauge::new(name, help).expect("metric creation");
    registry
        .register(Box::new(gauge.clone()))
        .expect("metric registration");
    gauge
}

impl GatewayMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("sente".into()), None)
            .expect("failed to create prometheus registry");

        let ussd_requests_total = int_counter(
            &registry,
            "ussd_requests_total",
            "Total number of USSD webhook requests handled",
        );
        let ussd_sessions_ended_total = int_counter(
            &registry,
            "ussd_sessions_ended_total",
            "Total number of USSD sessions ended with a terminal reply",
        );
        let pin_failures_total = int_counter(
            &registry,
            "pin_failures_total",
            "Total number of PIN attempts that did not match",
        );
        let lockouts_total = int_counter(
            &registry,
            "lockouts_total",
            "Total number of accounts locked after exhausting their attempts",
        );
        let transfers_initiated_total = int_counter(
            &registry,
            "transfers_initiated_total",
            "Total number of transfers booked and dispatched to the ledger",
        );
        let transfers_settled_total = int_counter(
            &registry,
            "transfers_settled_total",
            "Total number of transfers settled successfully",
        );
        let transfers_failed_total = int_counter(
            &registry,
            "transfers_failed_total",
            "Total number of transfers settled as failed",
        );

        let ussd_sessions_active = int_gauge(
            &registry,
            "ussd_sessions_active",
            "Current number of live USSD sessions",
        );
        let accounts_registered = int_gauge(
            &registry,
            "accounts_registered",
            "Number of registered subscriber accounts",
        );

        let ussd_request_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "ussd_request_duration_seconds",
                "USSD webhook handling latency in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(ussd_request_duration_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            ussd_requests_total,
            ussd_sessions_ended_total,
            pin_failures_total,
            lockouts_total,
            transfers_initiated_total,
            transfers_settled_total,
            transfers_failed_total,
            ussd_sessions_active,
            accounts_registered,
            ussd_request_duration_seconds,
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// The core library reports security and settlement events straight into
/// the Prometheus counters.
impl Telemetry for GatewayMetrics {
    fn pin_failure(&self) {
        self.pin_failures_total.inc();
    }
    fn lockout(&self) {
        self.lockouts_total.inc();
    }
    fn transfer_initiated(&self) {
        self.transfers_initiated_total.inc();
    }
    fn transfer_settled(&self) {
        self.transfers_settled_total.inc();
    }
    fn transfer_failed(&self) {
        self.transfers_failed_total.inc();
    }
}

/// Shared metrics handle passed around the gateway.
pub type SharedMetrics = Arc<GatewayMetrics>;
