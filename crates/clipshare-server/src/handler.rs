//! Request handler (C4): routing, identifier and option validation, ties
//! the store (C1), auth verifier (C2) and limits tracker (C3) together, and
//! emits the two response shapes spec §4.4/§6 describe.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use bytes::Bytes;
use clipshare_core::Config;
use clipshare_core::error::{Error, Result};
use clipshare_core::ids::validate_id;
use clipshare_core::store::ClipboardStore;
use clipshare_limits::LimitsTracker;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use rand::Rng;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

use crate::assets;
use crate::cert::PinnedCert;
use crate::options::{
    Format, declares_empty_body, parse_put_options, parse_query, resolve_expires, resolve_mode,
};
use crate::response::{RespBody, TransferInfo, bytes_body, empty_body, error_response, reader_body, receiver_body, transfer_response};
use crate::visitor::visitor_ip;

/// Shared state every request handler closes over.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ClipboardStore>,
    pub limits: Arc<LimitsTracker>,
    pub pinned_cert: PinnedCert,
}

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const RANDOM_ID_LEN: usize = 10;

fn random_id() -> String {
    let mut rng = rand::thread_rng();
    (0..RANDOM_ID_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Top-level entry point: wraps routing with the per-request timeout
/// (spec §5) and turns every `Error` into the response the client sees.
pub async fn handle(
    req: Request<Incoming>,
    state: Arc<AppState>,
    peer: SocketAddr,
    is_tls: bool,
) -> std::result::Result<Response<RespBody>, Infallible> {
    let timeout = state.config.request_timeout;
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match tokio::time::timeout(timeout, route(req, &state, peer, is_tls)).await {
        Ok(Ok(resp)) => {
            debug!(%method, %path, status = resp.status().as_u16(), "request handled");
            Ok(resp)
        }
        Ok(Err(err)) => {
            debug!(%method, %path, status = err.status_code(), "request failed");
            Ok(error_response(&err))
        }
        Err(_elapsed) => {
            warn!(%method, %path, "request timed out");
            Ok(error_response(&Error::GatewayTimeout))
        }
    }
}

async fn route(
    req: Request<Incoming>,
    state: &Arc<AppState>,
    peer: SocketAddr,
    is_tls: bool,
) -> Result<Response<RespBody>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = parse_query(req.uri().query().unwrap_or(""));
    let headers = req.headers().clone();

    check_host_port(&headers, &state.config)?;

    match (method.clone(), path.as_str()) {
        (Method::GET, "/info") => Ok(info_response(state)),
        (Method::GET, "/verify") => verify_response(state, &headers, &query),
        (Method::GET, "/") => Ok(root_response(state, is_tls, &headers)),
        (Method::GET, p) if p.starts_with("/static/") => Ok(static_response(p)),
        (Method::PUT, "/") | (Method::POST, "/") => {
            let id = random_id();
            put_entry(req, state, peer, &headers, &query, &id).await
        }
        (Method::PUT, p) | (Method::POST, p) => {
            let id = p.trim_start_matches('/').to_string();
            put_entry(req, state, peer, &headers, &query, &id).await
        }
        (Method::GET, p) | (Method::HEAD, p) => {
            let id = p.trim_start_matches('/').to_string();
            get_entry(state, &headers, &query, &id, method == Method::HEAD).await
        }
        (Method::DELETE, p) => {
            let id = p.trim_start_matches('/').to_string();
            delete_entry(state, &headers, &query, &id).await
        }
        _ => Err(Error::NotFound),
    }
}

fn authorize(
    state: &Arc<AppState>,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
    method: &str,
    path: &str,
) -> Result<()> {
    let header = headers
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let query_a = query.get("a").map(String::as_str);
    if clipshare_auth::is_authorized(
        state.config.key.as_ref(),
        header,
        query_a,
        method,
        path,
        now_secs(),
    ) {
        Ok(())
    } else {
        Err(Error::Unauthorized)
    }
}

/// Rejects a `Host` header whose port disagrees with the configured public
/// `ServerAddr` (spec §4.6) — left unenforced silently, the curl command
/// this handler itself generates would point at the wrong port.
fn check_host_port(headers: &HeaderMap, config: &Config) -> Result<()> {
    let Some(host) = headers
        .get(hyper::header::HOST)
        .and_then(|v| v.to_str().ok())
    else {
        return Ok(());
    };
    let Some(port) = host.rsplit_once(':').and_then(|(_, p)| p.parse::<u16>().ok()) else {
        return Ok(());
    };
    let Some(expected) = config
        .server_addr
        .rsplit_once(':')
        .and_then(|(_, p)| p.parse::<u16>().ok())
    else {
        return Ok(());
    };
    if port != expected {
        return Err(Error::BadRequest(format!(
            "Host port {port} does not match server address {}",
            config.server_addr
        )));
    }
    Ok(())
}

#[derive(Serialize)]
struct InfoJson<'a> {
    #[serde(rename = "serverAddr")]
    server_addr: &'a str,
    salt: String,
}

fn info_response(state: &Arc<AppState>) -> Response<RespBody> {
    let salt = state
        .config
        .key
        .as_ref()
        .map(|k| B64.encode(&k.salt))
        .unwrap_or_default();
    let body = InfoJson {
        server_addr: &state.config.server_addr,
        salt,
    };
    let bytes = serde_json::to_vec(&body).unwrap_or_default();
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .body(bytes_body(bytes))
        .expect("response assembled from valid parts")
}

fn verify_response(
    state: &Arc<AppState>,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
) -> Result<Response<RespBody>> {
    authorize(state, headers, query, "GET", "/verify")?;
    Ok(Response::builder()
        .status(StatusCode::OK)
        .body(empty_body())
        .expect("response assembled from valid parts"))
}

fn root_response(state: &Arc<AppState>, is_tls: bool, headers: &HeaderMap) -> Response<RespBody> {
    if !is_tls && state.config.listen_http.is_some() {
        let location = format!("https://{}/", state.config.server_addr);
        return Response::builder()
            .status(StatusCode::FOUND)
            .header("Location", location)
            .body(empty_body())
            .expect("response assembled from valid parts");
    }

    let is_curl = headers
        .get(hyper::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ua| ua.starts_with("curl/"));

    if is_curl {
        Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(bytes_body(assets::LANDING_TEXT))
            .expect("response assembled from valid parts")
    } else {
        Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "text/html; charset=utf-8")
            .body(bytes_body(assets::INDEX_HTML))
            .expect("response assembled from valid parts")
    }
}

fn static_response(path: &str) -> Response<RespBody> {
    let name = path.trim_start_matches("/static/");
    match assets::lookup_static(name) {
        Some((content_type, body)) => Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", content_type)
            .body(bytes_body(body))
            .expect("response assembled from valid parts"),
        None => error_response(&Error::NotFound),
    }
}

async fn put_entry(
    req: Request<Incoming>,
    state: &Arc<AppState>,
    peer: SocketAddr,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
    id: &str,
) -> Result<Response<RespBody>> {
    if !validate_id(id) {
        return Err(Error::BadRequest(format!("invalid id: {id}")));
    }
    let method = req.method().as_str().to_string();
    let path = format!("/{id}");
    authorize(state, headers, query, &method, &path)?;

    let opts = parse_put_options(headers, query);
    let mode = resolve_mode(opts.mode_raw.as_deref(), &state.config.file_modes_allowed)?;
    let now = now_secs();
    let expires = resolve_expires(opts.ttl_raw.as_deref(), state.config.file_expire_after, now)?;

    let is_new = state.store.stat(id).await.is_err();
    if is_new {
        state.limits.check_new_entry_count()?;
        let ip = visitor_ip(peer, headers, state.config.trust_forwarded_header);
        state.limits.try_record_visitor_put(ip)?;
    }

    if opts.stream {
        if declares_empty_body(headers) {
            return Err(Error::BadRequest("s=1 without a body".into()));
        }
        stream_into_pipe(req, state, id, mode, expires).await?;
    } else if opts.reserve {
        state.store.reserve(id, mode, expires).await?;
    } else {
        if is_new {
            state.limits.check_size_headroom()?;
        }
        let reader = body_reader(req);
        state
            .store
            .write(id, reader, mode, expires, state.config.file_size_limit)
            .await?;
    }

    let transfer = TransferInfo::new(&state.config, &state.pinned_cert, id, expires, now);
    Ok(transfer_response(&transfer, opts.format))
}

fn body_reader(req: Request<Incoming>) -> Pin<Box<dyn AsyncRead + Send>> {
    let stream = req
        .into_body()
        .into_data_stream()
        .map_err(|e| std::io::Error::other(e.to_string()));
    Box::pin(StreamReader::new(stream))
}

/// Drives the streaming-transfer state machine (spec §4.1/§4.4): creates
/// the FIFO, opens the producer side, then pumps the request body into it.
/// Any failure — rendezvous timeout, a client disconnect mid-body — tears
/// the pipe and meta back down before returning.
async fn stream_into_pipe(
    req: Request<Incoming>,
    state: &Arc<AppState>,
    id: &str,
    mode: clipshare_core::model::Mode,
    expires: u64,
) -> Result<()> {
    state.store.write_stream(id, mode, expires).await?;

    let mut producer = match state
        .store
        .open_producer(id, state.config.fifo_rendezvous_timeout)
        .await
    {
        Ok(p) => p,
        Err(e) => {
            state.store.delete(id).await.ok();
            return Err(e);
        }
    };

    let mut reader = body_reader(req);
    if let Err(e) = tokio::io::copy(&mut reader, &mut producer).await {
        state.store.delete(id).await.ok();
        return Err(Error::Internal(format!("stream transfer failed: {e}")));
    }
    Ok(())
}

async fn get_entry(
    state: &Arc<AppState>,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
    id: &str,
    head_only: bool,
) -> Result<Response<RespBody>> {
    if !validate_id(id) {
        return Err(Error::BadRequest(format!("invalid id: {id}")));
    }
    let method = if head_only { "HEAD" } else { "GET" };
    let path = format!("/{id}");
    authorize(state, headers, query, method, &path)?;

    let info = state.store.stat(id).await?;
    let now = now_secs();
    let transfer = TransferInfo::new(&state.config, &state.pinned_cert, id, info.meta.expires, now);

    if head_only {
        return Ok(transfer
            .apply_headers(Response::builder().status(StatusCode::OK))
            .body(empty_body())
            .expect("response assembled from valid parts"));
    }

    if state.store.is_stream(id).await {
        let reader = state
            .store
            .open_consumer(id, state.config.fifo_rendezvous_timeout)
            .await?;
        let store = state.store.clone();
        let id_owned = id.to_string();
        let (tx, rx) = tokio::sync::mpsc::channel::<std::io::Result<Bytes>>(16);
        tokio::spawn(async move {
            pump_to_channel(reader, tx).await;
            // Drains or client-disconnects both end here: either way the
            // spec requires the FIFO and its meta to be gone (§3 invariant 4).
            let _ = store.delete(&id_owned).await;
        });
        Ok(transfer
            .apply_headers(Response::builder().status(StatusCode::OK))
            .body(receiver_body(rx))
            .expect("response assembled from valid parts"))
    } else {
        let reader = state.store.read(id).await?;
        Ok(transfer
            .apply_headers(Response::builder().status(StatusCode::OK))
            .body(reader_body(reader))
            .expect("response assembled from valid parts"))
    }
}

async fn pump_to_channel(
    mut reader: Pin<Box<dyn AsyncRead + Send>>,
    tx: tokio::sync::mpsc::Sender<std::io::Result<Bytes>>,
) {
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(Ok(Bytes::copy_from_slice(&buf[..n]))).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                break;
            }
        }
    }
}

async fn delete_entry(
    state: &Arc<AppState>,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
    id: &str,
) -> Result<Response<RespBody>> {
    if !validate_id(id) {
        return Err(Error::BadRequest(format!("invalid id: {id}")));
    }
    authorize(state, headers, query, "DELETE", &format!("/{id}"))?;

    // A missing id is *not-found*, not a silent no-op, per spec §7.
    state.store.stat(id).await?;
    state.store.delete(id).await?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .body(empty_body())
        .expect("response assembled from valid parts"))
}

#[allow(clippy::unused_async)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_id_has_expected_shape() {
        let id = random_id();
        assert_eq!(id.len(), RANDOM_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn host_port_mismatch_is_rejected() {
        let config = test_config();
        let mut headers = HeaderMap::new();
        headers.insert(hyper::header::HOST, "example.com:9999".parse().unwrap());
        assert!(check_host_port(&headers, &config).is_err());
    }

    #[test]
    fn host_port_match_is_accepted() {
        let config = test_config();
        let mut headers = HeaderMap::new();
        headers.insert(hyper::header::HOST, "example.com:4443".parse().unwrap());
        assert!(check_host_port(&headers, &config).is_ok());
    }

    #[test]
    fn missing_host_header_is_not_rejected() {
        let config = test_config();
        assert!(check_host_port(&HeaderMap::new(), &config).is_ok());
    }

    fn test_config() -> Config {
        Config {
            listen_https: "127.0.0.1:4443".parse().unwrap(),
            listen_http: None,
            server_addr: "example.com:4443".to_string(),
            cert_file: "cert.pem".into(),
            key_file: "key.pem".into(),
            clipboard_dir: "/tmp/clipshare".into(),
            key: None,
            file_size_limit: 1024,
            clipboard_size_limit: 1024,
            clipboard_count_limit: 10,
            file_count_per_visitor_limit: 10,
            file_expire_after: std::time::Duration::from_secs(3600),
            file_modes_allowed: vec![clipshare_core::model::Mode::Rw],
            manager_interval: std::time::Duration::from_secs(60),
            visitor_window: std::time::Duration::from_secs(60),
            fifo_rendezvous_timeout: std::time::Duration::from_secs(30),
            request_timeout: std::time::Duration::from_secs(30),
            trust_forwarded_header: false,
        }
    }
}
