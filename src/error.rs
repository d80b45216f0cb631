//! Error types for hubgate

use thiserror::Error;

/// Main error type for hubgate
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TLS error: {0}")]
    Tls(String),
}

/// Result type alias for hubgate
pub type Result<T> = std::result::Result<T, Error>;
