use serde::{Deserialize, Serialize};

/// Write mode recorded in an entry's sidecar meta file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Read-only: cannot be overwritten until it expires.
    Ro,
    /// Read-write: a later PUT to the same id replaces it.
    Rw,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Ro => "ro",
            Mode::Rw => "rw",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ro" => Some(Mode::Ro),
            "rw" => Some(Mode::Rw),
            _ => None,
        }
    }
}

/// The sidecar record stored at `<id>:meta`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Meta {
    pub mode: Mode,
    /// Absolute seconds since epoch; `0` means "never expires".
    pub expires: u64,
}

impl Meta {
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires != 0 && self.expires <= now
    }
}

/// What `Stat`/`List` return for a valid entry.
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub id: String,
    pub meta: Meta,
    pub size: u64,
}

/// In-memory aggregate maintained by the manager loop (C5) and consulted by
/// the limits tracker (C3).
#[derive(Debug, Clone, Copy, Default)]
pub struct ClipboardStats {
    pub count: u64,
    pub total_bytes: u64,
}
