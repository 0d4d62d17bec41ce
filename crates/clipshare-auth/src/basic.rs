use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use subtle::ConstantTimeEq;

use crate::key;

/// Verifies an `Authorization: Basic ...` value against the configured key.
/// The username portion is ignored, per spec §4.2.
pub fn verify(header_value: &str, salt: &[u8], key_bytes: &[u8]) -> bool {
    let Some(encoded) = header_value.strip_prefix("Basic ") else {
        return false;
    };
    let Ok(decoded) = B64.decode(encoded.trim()) else {
        return false;
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return false;
    };
    let Some((_username, password)) = decoded.split_once(':') else {
        return false;
    };

    let derived = key::derive(password.as_bytes(), salt);
    bool::from(derived.ct_eq(key_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_correct_password_ignores_username() {
        let k = key::new_key(b"hunter2");
        let header = format!("Basic {}", B64.encode("anyone:hunter2"));
        assert!(verify(&header, &k.salt, &k.bytes));
    }

    #[test]
    fn rejects_wrong_password() {
        let k = key::new_key(b"hunter2");
        let header = format!("Basic {}", B64.encode("anyone:wrong"));
        assert!(!verify(&header, &k.salt, &k.bytes));
    }

    #[test]
    fn rejects_malformed_header() {
        let k = key::new_key(b"hunter2");
        assert!(!verify("Bearer xyz", &k.salt, &k.bytes));
        assert!(!verify("Basic not-base64!!", &k.salt, &k.bytes));
    }
}
