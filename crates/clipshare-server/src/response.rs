//! Response shaping: the two body formats (`text`/`json`) and the
//! `X-File`/`X-URL`/`X-Curl`/`X-TTL`/`X-Expires` headers spec §6 requires on
//! every successful PUT/HEAD/GET.

use std::convert::Infallible;
use std::pin::Pin;

use bytes::Bytes;
use clipshare_core::Config;
use clipshare_core::error::Error;
use futures_util::TryStreamExt;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use hyper::{Response, StatusCode};
use serde::Serialize;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

use crate::cert::PinnedCert;
use crate::options::Format;

pub type RespBody = BoxBody<Bytes, std::io::Error>;

pub fn empty_body() -> RespBody {
    Full::new(Bytes::new())
        .map_err(|never: Infallible| match never {})
        .boxed()
}

pub fn bytes_body(bytes: impl Into<Bytes>) -> RespBody {
    Full::new(bytes.into())
        .map_err(|never: Infallible| match never {})
        .boxed()
}

/// Wraps a payload reader (a regular file or a FIFO) into a streamed
/// response body instead of buffering it in memory.
pub fn reader_body(reader: Pin<Box<dyn AsyncRead + Send>>) -> RespBody {
    let stream = ReaderStream::new(reader).map_ok(Frame::data);
    StreamBody::new(stream).boxed()
}

/// Wraps a channel of chunks into a streamed response body. Used for the
/// streaming-entry GET path, where a background task pumps FIFO bytes into
/// the channel and tears the entry down once the pump ends (spec §3
/// invariant 4).
pub fn receiver_body(rx: tokio::sync::mpsc::Receiver<std::io::Result<Bytes>>) -> RespBody {
    let stream = tokio_stream::wrappers::ReceiverStream::new(rx).map_ok(Frame::data);
    StreamBody::new(stream).boxed()
}

/// Everything a successful PUT/HEAD/GET exposes, both as headers and (for
/// `json`) as the response body (spec §6).
pub struct TransferInfo {
    pub file: String,
    pub url: String,
    pub curl: String,
    pub ttl: u64,
    pub expires: u64,
}

#[derive(Serialize)]
struct TransferInfoJson<'a> {
    file: &'a str,
    url: &'a str,
    curl: &'a str,
    ttl: u64,
    expires: u64,
}

impl TransferInfo {
    pub fn new(config: &Config, pinned: &PinnedCert, id: &str, expires: u64, now: u64) -> Self {
        let url = format!("https://{}/{id}", config.server_addr);
        let curl = format!("curl --pinnedpubkey {} {url}", pinned.curl_pin());
        Self {
            file: id.to_string(),
            url,
            curl,
            ttl: expires.saturating_sub(now),
            expires,
        }
    }

    pub fn apply_headers(&self, builder: http::response::Builder) -> http::response::Builder {
        builder
            .header("X-File", &self.file)
            .header("X-URL", &self.url)
            .header("X-Curl", &self.curl)
            .header("X-TTL", self.ttl.to_string())
            .header("X-Expires", self.expires.to_string())
    }

    fn as_json(&self) -> TransferInfoJson<'_> {
        TransferInfoJson {
            file: &self.file,
            url: &self.url,
            curl: &self.curl,
            ttl: self.ttl,
            expires: self.expires,
        }
    }
}

/// Builds the success response for a PUT: headers always carry the
/// transfer info; the body additionally carries it when `format=json`.
pub fn transfer_response(info: &TransferInfo, format: Format) -> Response<RespBody> {
    let builder = info.apply_headers(Response::builder().status(StatusCode::OK));
    match format {
        Format::Json => {
            let body = serde_json::to_vec(&info.as_json()).unwrap_or_default();
            builder
                .header("Content-Type", "application/json")
                .body(bytes_body(body))
                .expect("response assembled from valid parts")
        }
        Format::Text => builder
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(bytes_body(format!("{}\n", info.url)))
            .expect("response assembled from valid parts"),
    }
}

/// Maps the shared error taxonomy (spec §7) onto an HTTP response with a
/// terse plain-text body.
pub fn error_response(err: &Error) -> Response<RespBody> {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(bytes_body(format!("{err}\n")))
        .expect("response assembled from valid parts")
}
