//! Prometheus-backed metric sinks
//!
//! Metric names are stable; dashboards depend on them.

use std::sync::Arc;

use lazy_static::lazy_static;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};

use super::{ConnMetrics, Counter, Gauge, Observer};

lazy_static! {
    /// Registry backing the /metrics endpoint
    pub(crate) static ref REGISTRY: Registry = Registry::new();

    static ref CONN_ACCEPTED: IntCounter = IntCounter::new(
        "conn_accepted",
        "The total number of accepted connections"
    ).unwrap();

    static ref CONN_ERROR: IntCounter = IntCounter::new(
        "conn_error",
        "The total number of connections failed with an error"
    ).unwrap();

    static ref CONN_OPEN: IntGauge = IntGauge::new(
        "conn_open",
        "The number of open connections"
    ).unwrap();

    static ref CONN_INSECURE: IntCounter = IntCounter::new(
        "conn_insecure",
        "The total number of insecure connections"
    ).unwrap();

    static ref CONN_INSECURE_OPEN: IntGauge = IntGauge::new(
        "conn_insecure_open",
        "The number of open insecure connections"
    ).unwrap();

    static ref CONN_TLS: IntCounter = IntCounter::new(
        "conn_tls",
        "The total number of TLS connections"
    ).unwrap();

    static ref CONN_TLS_OPEN: IntGauge = IntGauge::new(
        "conn_tls_open",
        "The number of open TLS connections"
    ).unwrap();

    static ref CONN_TLS_HANDSHAKE_SEC: Histogram = Histogram::with_opts(
        HistogramOpts::new("conn_tls_handshake_sec", "Time spent on TLS handshake")
    ).unwrap();

    static ref CONN_RX_BYTES: IntCounter = IntCounter::new(
        "conn_rx_bytes",
        "Total bytes forwarded to the client"
    ).unwrap();

    static ref CONN_TX_BYTES: IntCounter = IntCounter::new(
        "conn_tx_bytes",
        "Total bytes forwarded to the hub"
    ).unwrap();
}

/// Register all metrics with the registry; repeat registrations are ignored
/// so multiple proxies in one process share the same series.
fn register_all() {
    REGISTRY.register(Box::new(CONN_ACCEPTED.clone())).ok();
    REGISTRY.register(Box::new(CONN_ERROR.clone())).ok();
    REGISTRY.register(Box::new(CONN_OPEN.clone())).ok();
    REGISTRY.register(Box::new(CONN_INSECURE.clone())).ok();
    REGISTRY.register(Box::new(CONN_INSECURE_OPEN.clone())).ok();
    REGISTRY.register(Box::new(CONN_TLS.clone())).ok();
    REGISTRY.register(Box::new(CONN_TLS_OPEN.clone())).ok();
    REGISTRY.register(Box::new(CONN_TLS_HANDSHAKE_SEC.clone())).ok();
    REGISTRY.register(Box::new(CONN_RX_BYTES.clone())).ok();
    REGISTRY.register(Box::new(CONN_TX_BYTES.clone())).ok();
}

struct PromCounter(IntCounter);

impl Counter for PromCounter {
    fn add(&self, v: u64) {
        self.0.inc_by(v);
    }
}

struct PromGauge(IntGauge);

impl Gauge for PromGauge {
    fn add(&self, v: i64) {
        if v < 0 {
            self.0.sub(-v);
        } else {
            self.0.add(v);
        }
    }
}

struct PromObserver(Histogram);

impl Observer for PromObserver {
    fn observe(&self, v: f64) {
        self.0.observe(v);
    }
}

impl ConnMetrics {
    /// Sinks bound to the Prometheus registry served on /metrics.
    pub fn prometheus() -> Self {
        register_all();
        Self {
            accepted: Arc::new(PromCounter(CONN_ACCEPTED.clone())),
            errors: Arc::new(PromCounter(CONN_ERROR.clone())),
            open: Arc::new(PromGauge(CONN_OPEN.clone())),
            insecure: Arc::new(PromCounter(CONN_INSECURE.clone())),
            insecure_open: Arc::new(PromGauge(CONN_INSECURE_OPEN.clone())),
            tls: Arc::new(PromCounter(CONN_TLS.clone())),
            tls_open: Arc::new(PromGauge(CONN_TLS_OPEN.clone())),
            tls_handshake: Arc::new(PromObserver(CONN_TLS_HANDSHAKE_SEC.clone())),
            rx_bytes: Arc::new(PromCounter(CONN_RX_BYTES.clone())),
            tx_bytes: Arc::new(PromCounter(CONN_TX_BYTES.clone())),
        }
    }
}
