//! Common types and abstractions
//!
//! This module defines the core types used throughout the application:
//! - Stream: unified async I/O abstraction
//! - PrefixedStream: replay wrapper that yields buffered bytes before the socket
//! - pipe: instrumented duplex copy between two streams

mod prefixed;
pub mod pipe;

pub use prefixed::PrefixedStream;

use tokio::io::{AsyncRead, AsyncWrite};

/// The core stream type used throughout the application.
/// All layers operate on this unified abstraction.
pub type Stream = Box<dyn AsyncReadWrite + Unpin + Send>;

/// Combined trait for async read + write
pub trait AsyncReadWrite: AsyncRead + AsyncWrite {}

impl<T: AsyncRead + AsyncWrite> AsyncReadWrite for T {}

impl std::fmt::Debug for dyn AsyncReadWrite + Send + Unpin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Stream")
    }
}
