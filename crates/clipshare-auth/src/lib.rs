pub mod basic;
pub mod hmac_auth;
pub mod key;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use clipshare_core::config::Key;

/// Decides whether a request is authorized per spec §4.2. `header` is the
/// raw `Authorization` header value, if any; `query_a` is the raw `a` query
/// parameter value, if any (the browser-friendly HMAC variant). `header`
/// wins if both are present, matching the header-over-query precedence used
/// for every other PUT option (spec §4.4).
pub fn is_authorized(
    key: Option<&Key>,
    header: Option<&str>,
    query_a: Option<&str>,
    method: &str,
    path: &str,
    now: u64,
) -> bool {
    let Some(key) = key else {
        // No key configured: unauthenticated access is allowed (spec §4.2.1).
        return true;
    };

    if let Some(header) = header {
        return verify_header_value(header, key, method, path, now);
    }

    if let Some(query_a) = query_a {
        let Ok(decoded) = B64.decode(query_a) else {
            return false;
        };
        let Ok(header) = String::from_utf8(decoded) else {
            return false;
        };
        return verify_header_value(&header, key, method, path, now);
    }

    false
}

fn verify_header_value(header: &str, key: &Key, method: &str, path: &str, now: u64) -> bool {
    if header.starts_with("Basic ") {
        return basic::verify(header, &key.salt, &key.bytes);
    }
    if let Some(parsed) = hmac_auth::parse_header(header) {
        return hmac_auth::verify(&parsed, &key.bytes, method, path, now);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_key_means_always_authorized() {
        assert!(is_authorized(None, None, None, "GET", "/x", 0));
    }

    #[test]
    fn missing_credentials_are_unauthorized_when_key_configured() {
        let k = key::new_key(b"hunter2");
        assert!(!is_authorized(Some(&k), None, None, "GET", "/x", 0));
    }

    #[test]
    fn basic_header_round_trips() {
        let k = key::new_key(b"hunter2");
        let header = format!("Basic {}", B64.encode("anyone:hunter2"));
        assert!(is_authorized(
            Some(&k),
            Some(&header),
            None,
            "GET",
            "/x",
            0
        ));
    }

    #[test]
    fn hmac_query_param_round_trips() {
        let k = Key {
            salt: b"some salt".to_vec(),
            bytes: b"16 bytes exactly".to_vec(),
        };
        let header = hmac_auth::build_header(&k.bytes, 1_000, 60, "GET", "/k");
        let query_a = B64.encode(&header);
        assert!(is_authorized(
            Some(&k),
            None,
            Some(&query_a),
            "GET",
            "/k",
            1_010
        ));
        assert!(!is_authorized(
            Some(&k),
            None,
            Some("not-valid-base64!!"),
            "GET",
            "/k",
            1_010
        ));
    }

    #[test]
    fn header_wins_over_query_on_conflict() {
        let k = Key {
            salt: b"some salt".to_vec(),
            bytes: b"16 bytes exactly".to_vec(),
        };
        let good_header = hmac_auth::build_header(&k.bytes, 1_000, 60, "GET", "/k");
        // Query param carries a bogus signature; header should still win.
        assert!(is_authorized(
            Some(&k),
            Some(&good_header),
            Some("garbage"),
            "GET",
            "/k",
            1_010
        ));
    }
}
