use clipshare_core::config::Key;
use rand::RngCore;

/// Number of PBKDF2-HMAC-SHA256 rounds applied to a Basic-auth password
/// before comparing it to the configured key bytes.
const PBKDF2_ROUNDS: u32 = 100_000;

/// Derives key bytes from a password and salt the same way the server does
/// when it generated its own `Key` (spec §4.2: "the password is run through
/// the server's key-derivation function").
pub fn derive(password: &[u8], salt: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(password, salt, PBKDF2_ROUNDS, &mut out);
    out
}

/// Builds a fresh `Key` from a plaintext password, generating a random salt.
/// Used by whatever assembles the server's `Config` (out of this crate's
/// scope to say where that password comes from — file, env, CLI flag).
pub fn new_key(password: &[u8]) -> Key {
    let mut salt = vec![0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let bytes = derive(password, &salt).to_vec();
    Key { salt, bytes }
}
