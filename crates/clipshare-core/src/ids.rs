/// Names the request router never hands out as a clipboard id (spec §6).
/// `static` covers the whole `/static/...` prefix, not just the bare name.
pub const RESERVED_IDS: &[&str] = &["info", "verify", "static", "robots.txt", "favicon.ico"];

/// Full identifier validation applied by the request handler to every
/// `{id}` path segment before it reaches the store (spec §4.4):
/// length 1..=64, restrictive character class, no traversal, not reserved.
pub fn validate_id(id: &str) -> bool {
    if id.is_empty() || id.len() > 64 {
        return false;
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return false;
    }
    if id.starts_with('.') || id.contains("..") || id.contains('/') {
        return false;
    }
    if RESERVED_IDS.contains(&id) {
        return false;
    }
    true
}

/// Defense-in-depth check the store applies to every id it is handed,
/// independent of whatever validation the request handler already did
/// (spec §3 invariant 2: "any request whose id would resolve outside
/// `ClipboardDir` is rejected").
pub fn is_safe_basename(id: &str) -> bool {
    !id.is_empty() && !id.contains('/') && !id.contains("..") && id != "." && id != ".."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_ids() {
        for id in ["hello", "a.b-c_d", "1", &"x".repeat(64)] {
            assert!(validate_id(id), "{id} should be valid");
        }
    }

    #[test]
    fn rejects_reserved_names() {
        for id in RESERVED_IDS {
            assert!(!validate_id(id));
        }
    }

    #[test]
    fn rejects_traversal_and_dotfiles() {
        for id in ["..", "../x", "a/b", "/etc/passwd", ".hidden", ""] {
            assert!(!validate_id(id), "{id} should be rejected");
        }
    }

    #[test]
    fn rejects_too_long_or_odd_characters() {
        assert!(!validate_id(&"x".repeat(65)));
        assert!(!validate_id("space here"));
        assert!(!validate_id("emoji🙂"));
    }
}
