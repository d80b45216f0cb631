//! Telemetry abstractions
//!
//! Counters, gauges and observers are narrow capability traits with no-op
//! defaults. The connection path always calls through these; binding a
//! metrics backend swaps the implementations at startup instead of
//! conditionally compiling telemetry calls.

mod prometheus;
mod server;

pub use server::serve_metrics;

use std::sync::Arc;

/// A monotonically increasing counter.
pub trait Counter: Send + Sync {
    fn add(&self, v: u64);
}

/// A value that can move in both directions.
pub trait Gauge: Send + Sync {
    fn add(&self, v: i64);
}

/// A distribution sink (histogram).
pub trait Observer: Send + Sync {
    fn observe(&self, v: f64);
}

struct Noop;

impl Counter for Noop {
    fn add(&self, _v: u64) {}
}

impl Gauge for Noop {
    fn add(&self, _v: i64) {}
}

impl Observer for Noop {
    fn observe(&self, _v: f64) {}
}

/// Per-connection metric sinks shared by the acceptor and connection tasks.
#[derive(Clone)]
pub struct ConnMetrics {
    pub accepted: Arc<dyn Counter>,
    pub errors: Arc<dyn Counter>,
    pub open: Arc<dyn Gauge>,
    pub insecure: Arc<dyn Counter>,
    pub insecure_open: Arc<dyn Gauge>,
    pub tls: Arc<dyn Counter>,
    pub tls_open: Arc<dyn Gauge>,
    pub tls_handshake: Arc<dyn Observer>,
    pub rx_bytes: Arc<dyn Counter>,
    pub tx_bytes: Arc<dyn Counter>,
}

impl ConnMetrics {
    /// Sinks that discard everything.
    pub fn noop() -> Self {
        let noop = Arc::new(Noop);
        Self {
            accepted: noop.clone(),
            errors: noop.clone(),
            open: noop.clone(),
            insecure: noop.clone(),
            insecure_open: noop.clone(),
            tls: noop.clone(),
            tls_open: noop.clone(),
            tls_handshake: noop.clone(),
            rx_bytes: noop.clone(),
            tx_bytes: noop,
        }
    }
}

impl Default for ConnMetrics {
    fn default() -> Self {
        Self::noop()
    }
}

/// Holds a gauge incremented; decrements it again on drop, so every exit
/// path of a connection restores the gauge.
pub struct GaugeGuard {
    gauge: Arc<dyn Gauge>,
}

impl GaugeGuard {
    pub fn hold(gauge: Arc<dyn Gauge>) -> Self {
        gauge.add(1);
        Self { gauge }
    }
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.gauge.add(-1);
    }
}
