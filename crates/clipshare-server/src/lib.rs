pub mod assets;
pub mod cert;
pub mod handler;
pub mod listener;
pub mod manager;
pub mod options;
pub mod response;
pub mod visitor;

use std::sync::Arc;

use clipshare_core::Config;
use clipshare_core::error::Result;
use clipshare_limits::LimitsTracker;
use clipshare_store::FsClipboardStore;
use tracing::info;

pub use cert::PinnedCert;
pub use handler::AppState;
pub use listener::Listener;
pub use manager::Manager;

/// Wires up the full daemon (C1-C6) from a finished `Config` and runs it
/// until ctrl-c, then shuts everything down gracefully. This is the single
/// call the root binary makes, mirroring the teacher's `run_tui` being the
/// one blocking call `main` hands off to.
pub async fn serve(config: Config) -> Result<()> {
    let store: Arc<dyn clipshare_core::store::ClipboardStore> =
        Arc::new(FsClipboardStore::open(&config.clipboard_dir).await?);
    let limits = Arc::new(LimitsTracker::new(
        config.visitor_window,
        config.file_count_per_visitor_limit,
        config.clipboard_count_limit,
        config.clipboard_size_limit,
    ));
    let pinned_cert = PinnedCert::from_cert_file(&config.cert_file)?;
    let tls_config = cert::load_server_config(&config.cert_file, &config.key_file)?;

    let manager = Manager::start(store.clone(), limits.clone(), config.manager_interval);

    let https_addr = config.listen_https;
    let http_addr = config.listen_http;
    let server_addr = config.server_addr.clone();

    let state = Arc::new(AppState {
        config,
        store,
        limits,
        pinned_cert,
    });

    let https_listener = Listener::start_https(https_addr, tls_config, state).await?;
    let http_listener = match http_addr {
        Some(addr) => Some(Listener::start_http_redirect(addr, server_addr).await?),
        None => None,
    };

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| clipshare_core::error::Error::Internal(format!("ctrl-c handler: {e}")))?;

    info!("clipshare: shutting down");
    https_listener.stop().await;
    if let Some(http_listener) = http_listener {
        http_listener.stop().await;
    }
    manager.stop().await;

    Ok(())
}
