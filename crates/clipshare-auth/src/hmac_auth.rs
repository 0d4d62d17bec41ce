use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Default tolerance for a timestamp that is slightly ahead of the server's
/// clock (spec §4.2: "timestamp ≤ now + small_skew").
pub const DEFAULT_MAX_SKEW_SECS: u64 = 30;

/// A parsed `Authorization: HMAC v1 ...` value.
#[derive(Debug, Clone, Copy)]
pub struct HmacHeader<'a> {
    pub timestamp: u64,
    pub ttl: u64,
    pub mac_b64: &'a str,
}

/// Parses `"HMAC v1 <timestamp> <ttl> <mac>"`. Returns `None` on any
/// malformed input; the caller maps that to *unauthorized*, not *bad-request*
/// (an attacker shouldn't learn which part of the header was wrong).
pub fn parse_header(value: &str) -> Option<HmacHeader<'_>> {
    let mut parts = value.splitn(4, ' ');
    if parts.next()? != "HMAC" {
        return None;
    }
    if parts.next()? != "v1" {
        return None;
    }
    let timestamp: u64 = parts.next()?.parse().ok()?;
    let rest = parts.next()?;
    let mut rest_parts = rest.splitn(2, ' ');
    let ttl: u64 = rest_parts.next()?.parse().ok()?;
    let mac_b64 = rest_parts.next()?;
    Some(HmacHeader {
        timestamp,
        ttl,
        mac_b64,
    })
}

/// Builds the signing string: `timestamp:ttl:method:path`.
fn signing_string(timestamp: u64, ttl: u64, method: &str, path: &str) -> String {
    format!("{timestamp}:{ttl}:{method}:{path}")
}

/// Computes the base64-encoded MAC the way a client would when producing
/// the `Authorization` header, per spec §6's signing-string definition.
pub fn compute_mac_b64(key: &[u8], timestamp: u64, ttl: u64, method: &str, path: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(signing_string(timestamp, ttl, method, path).as_bytes());
    B64.encode(mac.finalize().into_bytes())
}

/// Builds the full header value a client would send.
pub fn build_header(key: &[u8], timestamp: u64, ttl: u64, method: &str, path: &str) -> String {
    let mac_b64 = compute_mac_b64(key, timestamp, ttl, method, path);
    format!("HMAC v1 {timestamp} {ttl} {mac_b64}")
}

/// Verifies a parsed header against the request's method/path and the
/// server's key, with constant-time MAC comparison (`hmac::Mac::verify_slice`).
pub fn verify(header: &HmacHeader<'_>, key: &[u8], method: &str, path: &str, now: u64) -> bool {
    if header.timestamp > now.saturating_add(DEFAULT_MAX_SKEW_SECS) {
        return false;
    }
    let age = now.saturating_sub(header.timestamp);
    if age > header.ttl {
        return false;
    }

    let Ok(provided) = B64.decode(header.mac_b64) else {
        return false;
    };

    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(signing_string(header.timestamp, header.ttl, method, path).as_bytes());
    mac.verify_slice(&provided).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_header() {
        let key = b"16 bytes exactly";
        let header_value = build_header(key, 1_000, 60, "GET", "/k");
        let parsed = parse_header(&header_value).unwrap();
        assert!(verify(&parsed, key, "GET", "/k", 1_010));
    }

    #[test]
    fn rejects_wrong_method_path_or_key() {
        let key = b"16 bytes exactly";
        let header_value = build_header(key, 1_000, 60, "GET", "/k");
        let parsed = parse_header(&header_value).unwrap();

        assert!(!verify(&parsed, key, "PUT", "/k", 1_010));
        assert!(!verify(&parsed, key, "GET", "/other", 1_010));
        assert!(!verify(&parsed, b"different key......", "GET", "/k", 1_010));
    }

    #[test]
    fn rejects_outside_ttl_window() {
        let key = b"16 bytes exactly";
        let header_value = build_header(key, 1_000, 60, "GET", "/k");
        let parsed = parse_header(&header_value).unwrap();

        assert!(!verify(&parsed, key, "GET", "/k", 1_000 + 61));
    }

    #[test]
    fn rejects_timestamp_too_far_in_future() {
        let key = b"16 bytes exactly";
        let header_value = build_header(key, 10_000, 60, "GET", "/k");
        let parsed = parse_header(&header_value).unwrap();

        assert!(!verify(&parsed, key, "GET", "/k", 1));
    }

    #[test]
    fn malformed_header_does_not_parse() {
        assert!(parse_header("Basic abc").is_none());
        assert!(parse_header("HMAC v2 1 2 abc").is_none());
        assert!(parse_header("HMAC v1 notanumber 2 abc").is_none());
    }
}
