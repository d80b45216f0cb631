//! Session layer
//!
//! Server-side TLS termination for client connections. The hub side never
//! goes through this layer; the hub always speaks cleartext NMDC.

mod tls;

pub use tls::{TlsTerminator, ALPN_NMDC};
