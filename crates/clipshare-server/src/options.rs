//! PUT option parsing (spec §4.4): TTL, mode, format, stream, reserve.
//! Header and query both carry TTL/mode/format; on conflict the header wins.
//! Stream and reserve are query-only.

use std::collections::HashMap;
use std::time::Duration;

use clipshare_core::error::{Error, Result};
use clipshare_core::model::Mode;
use hyper::HeaderMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct PutOptions {
    pub ttl_raw: Option<String>,
    pub mode_raw: Option<String>,
    pub format: Format,
    pub stream: bool,
    pub reserve: bool,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Parses `?query=string` into a flat map. Repeated keys keep the last
/// occurrence, matching how `HeaderMap::get` returns a single value.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

pub fn parse_put_options(headers: &HeaderMap, query: &HashMap<String, String>) -> PutOptions {
    let ttl_raw = header_str(headers, "x-ttl")
        .map(str::to_string)
        .or_else(|| query.get("t").cloned());
    let mode_raw = header_str(headers, "x-mode")
        .map(str::to_string)
        .or_else(|| query.get("m").cloned());
    let format_raw = header_str(headers, "x-format")
        .map(str::to_string)
        .or_else(|| query.get("f").cloned());
    let format = match format_raw.as_deref() {
        Some(s) if s.eq_ignore_ascii_case("json") => Format::Json,
        _ => Format::Text,
    };
    let stream = query.get("s").map(String::as_str) == Some("1");
    let reserve = query.get("r").map(String::as_str) == Some("1");

    PutOptions {
        ttl_raw,
        mode_raw,
        format,
        stream,
        reserve,
    }
}

/// Resolves the requested mode against server policy (spec §4.4): invalid
/// strings and modes outside `FileModesAllowed` are both *bad-request*.
/// With no explicit mode, the first allowed mode is the default.
pub fn resolve_mode(mode_raw: Option<&str>, allowed: &[Mode]) -> Result<Mode> {
    match mode_raw {
        Some(s) => {
            let mode = Mode::parse(s)
                .ok_or_else(|| Error::BadRequest(format!("invalid mode: {s}")))?;
            if allowed.contains(&mode) {
                Ok(mode)
            } else {
                Err(Error::BadRequest(format!("mode not allowed: {s}")))
            }
        }
        None => allowed
            .first()
            .copied()
            .ok_or_else(|| Error::Internal("server has no allowed modes configured".into())),
    }
}

/// Resolves the requested TTL into an absolute expiry (seconds since epoch).
///
/// Request-side TTL is a human duration (`30s`, `5m`, `4d`); the response
/// later reports the resolved value in seconds under the same field name
/// (`ttl`/`X-TTL`) — an asymmetry spec §9 notes and preserves rather than
/// "fixes". `0`/an explicit zero duration means "never", but only when the
/// server's own `FileExpireAfter` is itself unlimited (`Duration::ZERO`);
/// otherwise it is clamped down to that ceiling like any other oversized
/// request, per spec §4.4's clamp rule.
pub fn resolve_expires(ttl_raw: Option<&str>, max: Duration, now: u64) -> Result<u64> {
    let requested = match ttl_raw {
        None => return Ok(default_expires(max, now)),
        Some(s) => humantime::parse_duration(s)
            .map_err(|_| Error::BadRequest(format!("invalid ttl: {s}")))?,
    };

    if requested.is_zero() {
        return Ok(default_expires(max, now));
    }

    let capped_secs = if max.is_zero() {
        requested.as_secs()
    } else {
        requested.as_secs().min(max.as_secs())
    };
    Ok(now + capped_secs)
}

fn default_expires(max: Duration, now: u64) -> u64 {
    if max.is_zero() {
        0
    } else {
        now + max.as_secs()
    }
}

/// Spec §7: "`s=1` without a body" is a bad-request. A client that declares
/// `Content-Length: 0` on a streaming PUT has nothing to pump through the
/// FIFO, so reject it before ever creating the pipe.
pub fn declares_empty_body(headers: &HeaderMap) -> bool {
    header_str(headers, "content-length") == Some("0")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_params_parse() {
        let q = parse_query("t=5m&m=ro&s=1");
        assert_eq!(q.get("t").map(String::as_str), Some("5m"));
        assert_eq!(q.get("m").map(String::as_str), Some("ro"));
        assert_eq!(q.get("s").map(String::as_str), Some("1"));
    }

    #[test]
    fn header_wins_over_query() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ttl", "30s".parse().unwrap());
        let query = parse_query("t=4d");
        let opts = parse_put_options(&headers, &query);
        assert_eq!(opts.ttl_raw.as_deref(), Some("30s"));
    }

    #[test]
    fn ttl_clamps_to_configured_max() {
        let now = 1_000;
        let max = Duration::from_secs(3600);
        let expires = resolve_expires(Some("10d"), max, now).unwrap();
        assert_eq!(expires, now + 3600);
    }

    #[test]
    fn ttl_zero_is_never_only_when_server_allows_unlimited() {
        let now = 1_000;
        assert_eq!(resolve_expires(Some("0"), Duration::ZERO, now).unwrap(), 0);
        assert_eq!(
            resolve_expires(Some("0"), Duration::from_secs(60), now).unwrap(),
            now + 60
        );
    }

    #[test]
    fn mode_must_be_in_allowed_set() {
        assert!(resolve_mode(Some("ro"), &[Mode::Ro]).is_ok());
        assert!(resolve_mode(Some("rw"), &[Mode::Ro]).is_err());
        assert!(resolve_mode(Some("bogus"), &[Mode::Ro, Mode::Rw]).is_err());
    }

    #[test]
    fn mode_defaults_to_first_allowed() {
        assert_eq!(resolve_mode(None, &[Mode::Rw, Mode::Ro]).unwrap(), Mode::Rw);
    }
}
