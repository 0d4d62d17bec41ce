use thiserror::Error;

/// Taxonomy from spec §7, shared by every crate in the workspace so the HTTP
/// layer has a single place to map errors to status codes.
#[derive(Debug, Error)]
pub enum Error {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("entry is read-only and has not expired")]
    ForbiddenOverwrite,

    #[error("no such entry")]
    NotFound,

    #[error("payload too large")]
    PayloadTooLarge,

    #[error("too many requests")]
    TooManyRequests,

    #[error("gateway timeout")]
    GatewayTimeout,

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status code per spec §7.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::BadRequest(_) => 400,
            Error::Unauthorized => 401,
            Error::ForbiddenOverwrite => 405,
            Error::NotFound => 404,
            Error::PayloadTooLarge => 413,
            Error::TooManyRequests => 429,
            Error::GatewayTimeout => 504,
            Error::Internal(_) => 500,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound,
            std::io::ErrorKind::TimedOut => Error::GatewayTimeout,
            _ => Error::Internal(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("meta (de)serialization failed: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
