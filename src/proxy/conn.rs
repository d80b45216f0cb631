//! Per-connection flow
//!
//! Classifies a fresh client connection by its first bytes, terminates TLS
//! when they look like a handshake, then announces the client to the hub and
//! relays both directions. The hub is dialed only after classification, so a
//! client that hangs during detection never consumes a hub slot.

use std::net::SocketAddr;
use std::time::Instant;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::common::{pipe, PrefixedStream, Stream};
use crate::error::Result;
use crate::telemetry::GaugeGuard;
use crate::transport;

use super::{prelude, ProxyState};

/// TLS record type of a handshake message.
const TLS_RECORD_HANDSHAKE: u8 = 0x16;
/// Legacy major version byte shared by every TLS ClientHello.
const TLS_LEGACY_MAJOR: u8 = 0x03;

/// Staging buffer: the prelude head plus room for the detection read. A
/// client that sends more before classification keeps the rest in the
/// socket; whoever reads next picks it up.
const STAGE_LEN: usize = 1024;

pub(super) async fn serve(
    state: &ProxyState,
    mut client: TcpStream,
    peer: SocketAddr,
) -> Result<()> {
    let metrics = &state.metrics;
    let _open = GaugeGuard::hold(metrics.open.clone());
    let _ = client.set_nodelay(true);

    let mut buf = vec![0u8; STAGE_LEN];
    let i = prelude::format(&mut buf, peer.ip());

    let (tls, wait) = match (state.tls.as_ref(), state.config.detect_wait()) {
        (Some(tls), Some(wait)) => (tls, wait),
        // No certs or no detection window: every client is plain NMDC.
        _ => {
            metrics.insecure.add(1);
            let _insecure = GaugeGuard::hold(metrics.insecure_open.clone());
            return announce_and_relay(state, &buf[..i], i, Box::new(client), peer).await;
        }
    };

    let started = Instant::now();
    let n = match timeout(wait, client.read(&mut buf[i..])).await {
        // Window elapsed without a byte: has to be plain NMDC.
        Err(_) => {
            metrics.insecure.add(1);
            let _insecure = GaugeGuard::hold(metrics.insecure_open.clone());
            return announce_and_relay(state, &buf[..i], i, Box::new(client), peer).await;
        }
        Ok(read) => read?,
    };

    if n >= 2 && buf[i] == TLS_RECORD_HANDSHAKE && buf[i + 1] == TLS_LEGACY_MAJOR {
        // The TLS engine must see the sniffed bytes before the socket.
        let sniffed = buf[i..i + n].to_vec();
        let tls_stream = tls.accept(PrefixedStream::new(sniffed, client)).await?;

        let version = tls_stream.get_ref().1.protocol_version();
        prelude::mark_tls(&mut buf[..i], version);

        metrics.tls.add(1);
        metrics
            .tls_handshake
            .observe(started.elapsed().as_secs_f64());
        let _tls_open = GaugeGuard::hold(metrics.tls_open.clone());
        announce_and_relay(state, &buf[..i], i, Box::new(tls_stream), peer).await
    } else {
        // Plain NMDC; the sniffed bytes belong to the hub side.
        metrics.insecure.add(1);
        let _insecure = GaugeGuard::hold(metrics.insecure_open.clone());
        announce_and_relay(state, &buf[..i + n], i, Box::new(client), peer).await
    }
}

/// Dial the hub, send the prelude (and any sniffed plain bytes), then splice.
/// The prelude write completes before the relay starts, so the hub sees it
/// ahead of all client payload.
async fn announce_and_relay(
    state: &ProxyState,
    head: &[u8],
    i: usize,
    client: Stream,
    peer: SocketAddr,
) -> Result<()> {
    let mut hub = transport::dial(state.config.hub_network, &state.config.hub_addr).await?;

    // Bytes past the prelude are client payload sniffed during detection.
    let sniffed = (head.len() - i) as u64;
    let head = if state.config.no_send_ip {
        &head[i..]
    } else {
        head
    };
    if !head.is_empty() {
        hub.write_all(head).await?;
        hub.flush().await?;
    }
    if sniffed > 0 {
        state.metrics.tx_bytes.add(sniffed);
    }

    let (tx, rx) = pipe::splice(
        client,
        hub,
        state.config.buffer_bytes(),
        &*state.metrics.tx_bytes,
        &*state.metrics.rx_bytes,
    )
    .await;

    debug!(%peer, tx = tx + sniffed, rx, "connection finished");
    Ok(())
}
