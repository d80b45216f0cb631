//! hubgate - a TLS-terminating front-end for NMDC hubs
//!
//! Sits between Direct Connect clients and a hub speaking cleartext NMDC.
//! Each accepted client is classified by its first bytes: a TLS ClientHello
//! is terminated locally with the configured certificate, anything else
//! passes through untouched. The hub always sees plain NMDC, prefixed with
//! a `$MyIP` line naming the client address and transport security.
//!
//! # Architecture
//!
//! ```text
//! client ──► accept ──► detect (bounded peek) ──► TLS terminate | passthrough
//!                                                        │
//!                                                        ▼
//!                                  $MyIP prelude ──► hub dial ──► duplex splice
//! ```
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── common/          # Stream abstraction, replay wrapper, duplex copy
//! ├── transport/       # Hub dialing (tcp4/tcp6/tcp/unix) and listener bind
//! ├── session/         # Server-side TLS termination
//! ├── proxy/           # Accept loops, protocol detection, prelude
//! └── telemetry/       # Metric traits, Prometheus binding, /metrics server
//! ```

pub mod common;
pub mod config;
pub mod error;
pub mod proxy;
pub mod session;
pub mod telemetry;
pub mod transport;

// Re-exports for convenience
pub use config::Config;
pub use error::{Error, Result};
pub use proxy::Proxy;
pub use transport::HubNetwork;
