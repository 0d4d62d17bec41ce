//! Visitor key extraction (spec §9 design note): defaults to the transport
//! peer address, and only honors `X-Forwarded-For` when the operator has
//! explicitly opted in, to avoid trivial spoofing in the default deployment.

use std::net::{IpAddr, SocketAddr};

use hyper::HeaderMap;

pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Returns the address that should be charged against the per-visitor limit.
pub fn visitor_ip(peer: SocketAddr, headers: &HeaderMap, trust_forwarded: bool) -> IpAddr {
    if trust_forwarded {
        if let Some(ip) = forwarded_ip(headers) {
            return ip;
        }
    }
    peer.ip()
}

/// Parses the left-most address in `X-Forwarded-For` — the original client,
/// per the usual reverse-proxy convention of appending each hop.
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let value = headers.get(FORWARDED_FOR_HEADER)?.to_str().ok()?;
    let first = value.split(',').next()?.trim();
    first.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn peer() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 9)), 443)
    }

    #[test]
    fn defaults_to_transport_peer_when_untrusted() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR_HEADER, "10.0.0.1".parse().unwrap());
        assert_eq!(visitor_ip(peer(), &headers, false), peer().ip());
    }

    #[test]
    fn honors_forwarded_header_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR_HEADER, "10.0.0.1, 10.0.0.2".parse().unwrap());
        assert_eq!(
            visitor_ip(peer(), &headers, true),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))
        );
    }

    #[test]
    fn falls_back_to_peer_if_forwarded_header_is_missing_or_bad() {
        let headers = HeaderMap::new();
        assert_eq!(visitor_ip(peer(), &headers, true), peer().ip());

        let mut bad = HeaderMap::new();
        bad.insert(FORWARDED_FOR_HEADER, "not-an-ip".parse().unwrap());
        assert_eq!(visitor_ip(peer(), &bad, true), peer().ip());
    }
}
