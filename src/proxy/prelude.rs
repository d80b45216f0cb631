//! The `$MyIP` line announced to the hub before any client bytes flow.
//!
//! The line ends with a four byte security tag, `0.0|`. It is written while
//! the connection is still unclassified and patched in place once a TLS
//! handshake completes, so the buffer layout is fixed: the prelude occupies
//! `[0, i)` of the staging buffer and detection reads land at `[i, ..)`.

use std::net::IpAddr;

use tokio_rustls::rustls::ProtocolVersion;

/// Width of the trailing security tag, the bytes `0.0|`.
pub(crate) const TAG_LEN: usize = 4;

/// Write `$MyIP <ip> 0.0|` into the head of `buf` and return its length.
/// The tag reads `0.0` (plain NMDC) until [`mark_tls`] rewrites it.
pub(crate) fn format(buf: &mut [u8], ip: IpAddr) -> usize {
    let head = format!("$MyIP {} 0.0|", ip);
    buf[..head.len()].copy_from_slice(head.as_bytes());
    head.len()
}

/// Rewrite the tag of a finished prelude to `1.<minor>` for the negotiated
/// TLS version. The dot and the terminating `|` stay untouched.
pub(crate) fn mark_tls(head: &mut [u8], version: Option<ProtocolVersion>) {
    let i = head.len();
    head[i - TAG_LEN] = b'1';
    head[i - 2] = match version {
        Some(ProtocolVersion::TLSv1_3) => b'3',
        Some(ProtocolVersion::TLSv1_2) => b'2',
        Some(ProtocolVersion::TLSv1_1) => b'1',
        _ => b'0',
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_ipv4() {
        let mut buf = [0u8; 1024];
        let i = format(&mut buf, "10.0.0.5".parse().unwrap());
        assert_eq!(&buf[..i], b"$MyIP 10.0.0.5 0.0|");
    }

    #[test]
    fn formats_ipv6() {
        let mut buf = [0u8; 1024];
        let i = format(&mut buf, "2001:db8::1".parse().unwrap());
        assert_eq!(&buf[..i], b"$MyIP 2001:db8::1 0.0|");
    }

    #[test]
    fn always_ends_in_terminator_with_fixed_tag() {
        for ip in ["0.0.0.0", "255.255.255.255", "::1", "fe80::dead:beef"] {
            let mut buf = [0u8; 1024];
            let i = format(&mut buf, ip.parse().unwrap());
            assert_eq!(buf[i - 1], b'|');
            assert_eq!(&buf[i - TAG_LEN..i], b"0.0|");
        }
    }

    #[test]
    fn marks_negotiated_versions() {
        let cases = [
            (Some(ProtocolVersion::TLSv1_3), &b"1.3|"[..]),
            (Some(ProtocolVersion::TLSv1_2), &b"1.2|"[..]),
            (Some(ProtocolVersion::TLSv1_1), &b"1.1|"[..]),
            (Some(ProtocolVersion::TLSv1_0), &b"1.0|"[..]),
            (None, &b"1.0|"[..]),
        ];
        for (version, want) in cases {
            let mut buf = [0u8; 1024];
            let i = format(&mut buf, "10.0.0.5".parse().unwrap());
            mark_tls(&mut buf[..i], version);
            assert_eq!(&buf[..i - TAG_LEN], b"$MyIP 10.0.0.5 ");
            assert_eq!(&buf[i - TAG_LEN..i], want);
        }
    }
}
