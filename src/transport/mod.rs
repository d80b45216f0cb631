//! Transport layer
//!
//! Establishes the raw connections on both sides of the proxy: bound
//! listeners for clients and the outbound hub stream. No encryption, no
//! protocol parsing; that happens in the layers above.

use std::io;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use tokio::net::{lookup_host, TcpListener, TcpStream};

use crate::common::Stream;

/// Address family used to reach the hub.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HubNetwork {
    /// TCP over IPv4 only
    #[default]
    Tcp4,
    /// TCP over IPv6 only
    Tcp6,
    /// TCP, whichever family resolves
    Tcp,
    /// Local-domain socket; the hub address is a filesystem path
    Unix,
}

impl std::str::FromStr for HubNetwork {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp4" => Ok(HubNetwork::Tcp4),
            "tcp6" => Ok(HubNetwork::Tcp6),
            "tcp" => Ok(HubNetwork::Tcp),
            "unix" => Ok(HubNetwork::Unix),
            _ => Err(format!("unknown hub network: {}", s)),
        }
    }
}

impl std::fmt::Display for HubNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HubNetwork::Tcp4 => "tcp4",
            HubNetwork::Tcp6 => "tcp6",
            HubNetwork::Tcp => "tcp",
            HubNetwork::Unix => "unix",
        };
        f.write_str(s)
    }
}

/// Open the hub-side stream. No retries, no pooling; callers fail fast.
pub async fn dial(network: HubNetwork, addr: &str) -> io::Result<Stream> {
    match network {
        HubNetwork::Tcp => {
            let stream = TcpStream::connect(addr).await?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream))
        }
        HubNetwork::Tcp4 => connect_family(addr, |a| a.is_ipv4()).await,
        HubNetwork::Tcp6 => connect_family(addr, |a| a.is_ipv6()).await,
        #[cfg(unix)]
        HubNetwork::Unix => {
            let stream = tokio::net::UnixStream::connect(addr).await?;
            Ok(Box::new(stream))
        }
        #[cfg(not(unix))]
        HubNetwork::Unix => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "unix sockets are not available on this platform",
        )),
    }
}

async fn connect_family(addr: &str, want: fn(&SocketAddr) -> bool) -> io::Result<Stream> {
    let mut last_err = None;
    for candidate in lookup_host(addr).await?.filter(want) {
        match TcpStream::connect(candidate).await {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(Box::new(stream));
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no address of the requested family for {}", addr),
        )
    }))
}

/// Bind a client-facing listener.
pub async fn bind(host: &str) -> io::Result<TcpListener> {
    TcpListener::bind(host).await
}
