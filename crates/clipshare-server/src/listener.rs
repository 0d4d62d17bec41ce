//! Listener/front (C6): the HTTPS listener and the optional plain-HTTP
//! redirect-only listener, both gracefully stoppable.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;
use tracing::{info, warn};

use crate::handler::{self, AppState};

/// A running listener task plus the means to ask it to stop.
pub struct Listener {
    shutdown_tx: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

impl Listener {
    /// Starts the TLS listener that serves the real API (spec §4.4's whole
    /// routing table).
    pub async fn start_https(
        addr: SocketAddr,
        tls_config: Arc<rustls::ServerConfig>,
        state: Arc<AppState>,
    ) -> std::io::Result<Self> {
        let tcp = TcpListener::bind(addr).await?;
        let acceptor = TlsAcceptor::from(tls_config);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(%addr, "clipshare: HTTPS listener bound");

        let handle = tokio::spawn(accept_loop_tls(tcp, acceptor, state, shutdown_rx));

        Ok(Self {
            shutdown_tx,
            handle,
        })
    }

    /// Starts the plain-HTTP listener that only ever answers with a 302 to
    /// the equivalent HTTPS URL (spec §4.6).
    pub async fn start_http_redirect(addr: SocketAddr, server_addr: String) -> std::io::Result<Self> {
        let tcp = TcpListener::bind(addr).await?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(%addr, "clipshare: plain-HTTP redirect listener bound");

        let handle = tokio::spawn(accept_loop_redirect(tcp, server_addr, shutdown_rx));

        Ok(Self {
            shutdown_tx,
            handle,
        })
    }

    /// Signals shutdown and waits for the accept loop to drain.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}

async fn accept_loop_tls(
    tcp: TcpListener,
    acceptor: TlsAcceptor,
    state: Arc<AppState>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            accepted = tcp.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "clipshare: TCP accept failed");
                        continue;
                    }
                };
                let acceptor = acceptor.clone();
                let state = state.clone();
                tokio::spawn(async move {
                    let tls_stream = match acceptor.accept(stream).await {
                        Ok(s) => s,
                        Err(e) => {
                            warn!(error = %e, "clipshare: TLS handshake failed");
                            return;
                        }
                    };
                    let io = TokioIo::new(tls_stream);
                    let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                        let state = state.clone();
                        async move { handler::handle(req, state, peer, true).await }
                    });
                    if let Err(e) = auto::Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await
                    {
                        warn!(error = %e, %peer, "clipshare: connection error");
                    }
                });
            }
        }
    }
}

async fn accept_loop_redirect(
    tcp: TcpListener,
    server_addr: String,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            accepted = tcp.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "clipshare: TCP accept failed");
                        continue;
                    }
                };
                let server_addr = server_addr.clone();
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                        let server_addr = server_addr.clone();
                        async move { redirect(req, server_addr) }
                    });
                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        warn!(error = %e, %peer, "clipshare: redirect connection error");
                    }
                });
            }
        }
    }
}

fn redirect(
    req: Request<hyper::body::Incoming>,
    server_addr: String,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let location = format!("https://{server_addr}{}", req.uri());
    Ok(Response::builder()
        .status(StatusCode::FOUND)
        .header("Location", location)
        .body(Full::new(Bytes::new()))
        .expect("response assembled from valid parts"))
}
