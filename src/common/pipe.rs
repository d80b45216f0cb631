//! Instrumented duplex copy between the client and hub streams.
//!
//! Two copy directions run concurrently; as soon as either direction ends,
//! for any reason, both streams are torn down so the sibling direction never
//! stays blocked reading a half-closed peer. Copy errors are swallowed here:
//! EOF and peer resets are how relayed connections normally end.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::common::Stream;
use crate::telemetry::Counter;

/// Relay bytes between `client` and `hub` until either side closes.
///
/// Counters advance after each completed write: client to hub feeds `tx`,
/// hub to client feeds `rx`. Returns the totals moved in each direction.
pub async fn splice(
    client: Stream,
    hub: Stream,
    buffer: usize,
    tx: &dyn Counter,
    rx: &dyn Counter,
) -> (u64, u64) {
    let (mut client_r, mut client_w) = tokio::io::split(client);
    let (mut hub_r, mut hub_w) = tokio::io::split(hub);

    let tx_total = AtomicU64::new(0);
    let rx_total = AtomicU64::new(0);

    let upload = copy_counted(&mut client_r, &mut hub_w, buffer, None, tx, &tx_total);
    let download = copy_counted(&mut hub_r, &mut client_w, buffer, None, rx, &rx_total);

    // Whichever direction finishes first wins; the other is dropped mid-read.
    tokio::select! {
        _ = upload => {}
        _ = download => {}
    }

    let _ = client_w.shutdown().await;
    let _ = hub_w.shutdown().await;

    (
        tx_total.load(Ordering::Relaxed),
        rx_total.load(Ordering::Relaxed),
    )
}

/// Copy from `src` to `dst` until EOF or the first error.
///
/// `limit` is the number of bytes remaining in a length-bounded source; the
/// copy buffer shrinks to it so bounded streams don't cost a full allocation.
async fn copy_counted<R, W>(
    src: &mut R,
    dst: &mut W,
    buffer: usize,
    limit: Option<u64>,
    counter: &dyn Counter,
    total: &AtomicU64,
) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let size = chunk_size(buffer, limit);
    let mut buf = BytesMut::with_capacity(size);
    buf.resize(size, 0);

    let mut written = 0u64;
    loop {
        let n = src.read(&mut buf).await?;
        if n == 0 {
            return Ok(written);
        }
        dst.write_all(&buf[..n]).await?;
        dst.flush().await?;
        counter.add(n as u64);
        total.fetch_add(n as u64, Ordering::Relaxed);
        written += n as u64;
    }
}

/// Copy buffer size for a source with `limit` bytes remaining, minimum 1.
fn chunk_size(buffer: usize, limit: Option<u64>) -> usize {
    let buffer = buffer.max(1);
    match limit {
        Some(n) if n < buffer as u64 => n.max(1) as usize,
        _ => buffer,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[derive(Default)]
    struct TestCounter(AtomicU64);

    impl Counter for TestCounter {
        fn add(&self, v: u64) {
            self.0.fetch_add(v, Ordering::Relaxed);
        }
    }

    fn pairs() -> (Stream, tokio::io::DuplexStream, Stream, tokio::io::DuplexStream) {
        let (client_near, client_far) = tokio::io::duplex(4096);
        let (hub_near, hub_far) = tokio::io::duplex(4096);
        (
            Box::new(client_near),
            client_far,
            Box::new(hub_near),
            hub_far,
        )
    }

    #[tokio::test]
    async fn round_trip_both_directions() {
        for buffer in [1usize, 2, 1024, 65536] {
            let (client, mut client_far, hub, mut hub_far) = pairs();
            let tx = Arc::new(TestCounter::default());
            let rx = Arc::new(TestCounter::default());
            let (tx2, rx2) = (tx.clone(), rx.clone());

            let task = tokio::spawn(async move {
                splice(client, hub, buffer, &*tx2, &*rx2).await
            });

            client_far.write_all(b"$MyNick user|").await.unwrap();
            let mut got = vec![0u8; 13];
            hub_far.read_exact(&mut got).await.unwrap();
            assert_eq!(&got, b"$MyNick user|");

            hub_far.write_all(b"$Hello user|").await.unwrap();
            let mut got = vec![0u8; 12];
            client_far.read_exact(&mut got).await.unwrap();
            assert_eq!(&got, b"$Hello user|");

            drop(client_far);
            let (tx_bytes, rx_bytes) = task.await.unwrap();
            assert_eq!(tx_bytes, 13);
            assert_eq!(rx_bytes, 12);
            assert_eq!(tx.0.load(Ordering::Relaxed), 13);
            assert_eq!(rx.0.load(Ordering::Relaxed), 12);
        }
    }

    #[tokio::test]
    async fn closing_one_side_tears_down_both() {
        let (client, client_far, hub, mut hub_far) = pairs();
        let tx = TestCounter::default();
        let rx = TestCounter::default();

        let task = tokio::spawn(async move {
            let (a, b) = splice(client, hub, 1024, &tx, &rx).await;
            (a, b)
        });

        // Client hangs up without sending anything.
        drop(client_far);

        let (tx_bytes, rx_bytes) = task.await.unwrap();
        assert_eq!((tx_bytes, rx_bytes), (0, 0));

        // The hub side must observe EOF rather than block forever.
        let mut buf = [0u8; 8];
        assert_eq!(hub_far.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn large_transfer_with_tiny_buffer() {
        let (client, mut client_far, hub, mut hub_far) = pairs();
        let tx = TestCounter::default();
        let rx = TestCounter::default();

        let task = tokio::spawn(async move {
            splice(client, hub, 1, &tx, &rx).await
        });

        let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let expected = payload.clone();
        let writer = tokio::spawn(async move {
            client_far.write_all(&payload).await.unwrap();
            drop(client_far);
        });

        let mut got = Vec::new();
        hub_far.read_to_end(&mut got).await.unwrap();
        assert_eq!(got, expected);

        writer.await.unwrap();
        let (tx_bytes, _) = task.await.unwrap();
        assert_eq!(tx_bytes, 10_000);
    }

    #[test]
    fn chunk_size_respects_limit() {
        assert_eq!(chunk_size(10 * 1024, None), 10 * 1024);
        assert_eq!(chunk_size(10 * 1024, Some(4)), 4);
        assert_eq!(chunk_size(10 * 1024, Some(0)), 1);
        assert_eq!(chunk_size(4, Some(1 << 20)), 4);
        assert_eq!(chunk_size(0, None), 1);
    }
}
