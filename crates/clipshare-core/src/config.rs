use std::path::PathBuf;
use std::time::Duration;

/// The server's shared secret: a salt plus derived key bytes. Absent entirely
/// means the instance is unauthenticated (spec §4.2, case 1).
#[derive(Debug, Clone)]
pub struct Key {
    pub salt: Vec<u8>,
    pub bytes: Vec<u8>,
}

/// Everything the core needs to run, assembled by an external caller (the CLI
/// front-end, a config file loader, ...). Parsing this from files or
/// environment variables is explicitly out of scope (spec §1); the core only
/// consumes the finished struct.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_https: std::net::SocketAddr,
    pub listen_http: Option<std::net::SocketAddr>,
    pub server_addr: String,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
    pub clipboard_dir: PathBuf,
    pub key: Option<Key>,
    pub file_size_limit: u64,
    pub clipboard_size_limit: u64,
    pub clipboard_count_limit: u64,
    pub file_count_per_visitor_limit: u64,
    pub file_expire_after: Duration,
    pub file_modes_allowed: Vec<crate::model::Mode>,
    pub manager_interval: Duration,
    pub visitor_window: Duration,
    pub fifo_rendezvous_timeout: Duration,
    pub request_timeout: Duration,
    /// Trust `X-Forwarded-For` for the visitor key. Off by default; see
    /// spec §9's design note on visitor-key extraction.
    pub trust_forwarded_header: bool,
}
