//! A stream that first yields bytes from an in-memory buffer, then continues
//! reading from the wrapped stream. Writes, flush and shutdown go straight
//! through to the wrapped stream.
//!
//! Protocol detection consumes the first bytes of a connection before knowing
//! who should own them. Wrapping the socket in a [`PrefixedStream`] hands
//! those bytes back, so the TLS engine sees the ClientHello from its very
//! first read.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Replay wrapper around a stream.
pub struct PrefixedStream<S> {
    head: Bytes,
    inner: S,
}

impl<S> PrefixedStream<S> {
    /// Wraps `inner` so that reads drain `head` before touching the stream.
    pub fn new(head: impl Into<Bytes>, inner: S) -> Self {
        Self {
            head: head.into(),
            inner,
        }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for PrefixedStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        if !self.head.is_empty() && buf.remaining() > 0 {
            let n = self.head.len().min(buf.remaining());
            let chunk = self.head.split_to(n);
            buf.put_slice(&chunk);
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for PrefixedStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn drains_head_before_inner() {
        let mut s = PrefixedStream::new(&b"hello "[..], Cursor::new(b"world".to_vec()));
        let mut out = Vec::new();
        s.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello world");
    }

    #[tokio::test]
    async fn partial_reads_from_head() {
        let mut s = PrefixedStream::new(&b"abcd"[..], Cursor::new(b"ef".to_vec()));

        let mut buf = [0u8; 3];
        let n = s.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"abc");

        let mut rest = Vec::new();
        s.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"def");
    }

    #[tokio::test]
    async fn empty_head_reads_inner_directly() {
        let mut s = PrefixedStream::new(Bytes::new(), Cursor::new(b"xyz".to_vec()));
        let mut out = Vec::new();
        s.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"xyz");
    }

    #[tokio::test]
    async fn writes_pass_through() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut s = PrefixedStream::new(&b"replayed"[..], client);

        s.write_all(b"direct").await.unwrap();
        s.shutdown().await.unwrap();

        let mut out = Vec::new();
        server.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"direct");
    }
}
