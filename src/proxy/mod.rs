//! Listener supervision and the accept loop
//!
//! A [`Proxy`] owns one accept loop per configured bind host. Accepted
//! connections run on detached tasks; the accept loop never waits for them.
//! Closing the proxy stops the accept loops and lets in-flight connections
//! finish naturally.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::session::TlsTerminator;
use crate::telemetry::{self, ConnMetrics};
use crate::transport;

mod conn;
mod prelude;

/// State shared by every accept loop and connection task.
pub(crate) struct ProxyState {
    pub(crate) config: Config,
    pub(crate) tls: Option<TlsTerminator>,
    pub(crate) metrics: ConnMetrics,
}

/// TLS-terminating front-end for an NMDC hub.
pub struct Proxy {
    state: Arc<ProxyState>,
    shutdown_tx: broadcast::Sender<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    local_addrs: Mutex<Vec<SocketAddr>>,
}

impl Proxy {
    /// Build a proxy from the configuration. The TLS certificate is loaded
    /// once here and shared by all connections.
    pub fn new(mut config: Config) -> Result<Self> {
        if config.hub_addr.is_empty() {
            config.hub_addr = "127.0.0.1:411".to_string();
        }

        let tls = match (&config.cert, &config.key) {
            (Some(cert), Some(key)) => {
                info!(cert = %cert.display(), key = %key.display(), "using certs");
                Some(TlsTerminator::load(cert, key)?)
            }
            _ => {
                info!("no certs; TLS disabled");
                None
            }
        };

        let metrics = if config.metrics.is_some() {
            ConnMetrics::prometheus()
        } else {
            ConnMetrics::noop()
        };

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            state: Arc::new(ProxyState {
                config,
                tls,
                metrics,
            }),
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
            local_addrs: Mutex::new(Vec::new()),
        })
    }

    /// Bind every configured host and start its accept loop. A bind failure
    /// drops the listeners opened so far and surfaces the error.
    pub async fn run(&self) -> Result<()> {
        if let Some(addr) = &self.state.config.metrics {
            let addr: SocketAddr = addr
                .parse()
                .map_err(|_| Error::Config(format!("Invalid metrics address: {}", addr)))?;
            info!(%addr, "serving metrics");
            tokio::spawn(telemetry::serve_metrics(addr, self.shutdown_tx.subscribe()));
        }

        let mut listeners = Vec::new();
        for host in &self.state.config.hosts {
            listeners.push(transport::bind(host).await?);
        }

        let mut handles = lock(&self.handles);
        let mut addrs = lock(&self.local_addrs);
        for listener in listeners {
            if let Ok(addr) = listener.local_addr() {
                info!(%addr, hub = %self.state.config.hub_addr, "proxying");
                addrs.push(addr);
            }
            let state = self.state.clone();
            let shutdown = self.shutdown_tx.subscribe();
            handles.push(tokio::spawn(accept_on(state, listener, shutdown)));
        }

        Ok(())
    }

    /// Addresses actually bound, in `hosts` order.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        lock(&self.local_addrs).clone()
    }

    /// Block until every accept loop has exited.
    pub async fn wait(&self) {
        let handles: Vec<_> = lock(&self.handles).drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Stop the accept loops. Idempotent; in-flight connections keep running.
    pub fn close(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Accept loop for one listener. Transient accept failures are counted and
/// never kill the loop; only the shutdown signal ends it.
async fn accept_on(
    state: Arc<ProxyState>,
    listener: TcpListener,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => match result {
                Ok((stream, peer)) => {
                    state.metrics.accepted.add(1);
                    let state = state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = conn::serve(&state, stream, peer).await {
                            state.metrics.errors.add(1);
                            if state.config.log_errors {
                                warn!(%peer, error = %e, "connection failed");
                            }
                        }
                    });
                }
                Err(e) => {
                    state.metrics.errors.add(1);
                    if state.config.log_errors {
                        warn!(error = %e, "accept failed");
                    }
                }
            },
            _ = shutdown.recv() => break,
        }
    }
}
