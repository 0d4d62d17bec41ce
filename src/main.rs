use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use clipshare_core::config::{Config, Key};
use clipshare_core::model::Mode;

/// cross-machine clipboard daemon: serves the HTTPS API described by
/// `clipshare-server` over a single clipboard directory.
#[derive(Parser)]
#[command(name = "clipshared", about = "cross-machine clipboard daemon", version)]
struct Cli {
    /// Address the HTTPS listener binds to.
    #[arg(long, default_value = "0.0.0.0:4443")]
    listen_https: SocketAddr,

    /// Address a plain-HTTP redirect-only listener binds to, if any.
    #[arg(long)]
    listen_http: Option<SocketAddr>,

    /// Public host:port used to build the `url`/`curl` fields in responses.
    #[arg(long)]
    server_addr: String,

    /// TLS certificate (PEM).
    #[arg(long)]
    cert: PathBuf,

    /// TLS private key (PEM).
    #[arg(long)]
    key: PathBuf,

    /// Directory holding clipboard payloads and sidecar meta files.
    #[arg(long, default_value = "./clipboard")]
    clipboard_dir: PathBuf,

    /// Password protecting the instance. Absent means unauthenticated.
    #[arg(long)]
    password: Option<String>,

    /// Per-file byte cap.
    #[arg(long, default_value_t = 100 * 1024 * 1024)]
    file_size_limit: u64,

    /// Aggregate byte cap across the whole clipboard.
    #[arg(long, default_value_t = 1024 * 1024 * 1024)]
    clipboard_size_limit: u64,

    /// Aggregate entry-count cap across the whole clipboard.
    #[arg(long, default_value_t = 1000)]
    clipboard_count_limit: u64,

    /// Per-visitor PUT count allowed within `visitor_window`.
    #[arg(long, default_value_t = 20)]
    file_count_per_visitor_limit: u64,

    /// Upper bound on any entry's TTL; `0` disables the cap ("never").
    #[arg(long, default_value = "24h")]
    file_expire_after: String,

    /// Modes clients may request, comma-separated subset of `ro,rw`.
    #[arg(long, default_value = "ro,rw", value_delimiter = ',')]
    file_modes_allowed: Vec<String>,

    /// How often the manager loop sweeps for expired entries.
    #[arg(long, default_value = "30s")]
    manager_interval: String,

    /// Sliding window used by the per-visitor rate limiter.
    #[arg(long, default_value = "1m")]
    visitor_window: String,

    /// How long a FIFO waits for its counterpart before timing out.
    #[arg(long, default_value = "30s")]
    fifo_rendezvous_timeout: String,

    /// Overall timeout applied to every request.
    #[arg(long, default_value = "60s")]
    request_timeout: String,

    /// Trust `X-Forwarded-For` for the visitor key instead of the transport
    /// peer address. Only safe behind a trusted reverse proxy.
    #[arg(long, default_value_t = false)]
    trust_forwarded_header: bool,
}

fn parse_duration(flag: &str, raw: &str) -> anyhow::Result<Duration> {
    humantime::parse_duration(raw).map_err(|e| anyhow::anyhow!("invalid --{flag} {raw:?}: {e}"))
}

fn build_config(cli: Cli) -> anyhow::Result<Config> {
    let key = cli
        .password
        .as_deref()
        .map(|p| clipshare_auth::key::new_key(p.as_bytes()));

    let file_modes_allowed = cli
        .file_modes_allowed
        .iter()
        .map(|s| Mode::parse(s).ok_or_else(|| anyhow::anyhow!("invalid --file-modes-allowed entry {s:?}")))
        .collect::<anyhow::Result<Vec<Mode>>>()?;
    if file_modes_allowed.is_empty() {
        anyhow::bail!("--file-modes-allowed must name at least one of ro,rw");
    }

    Ok(Config {
        listen_https: cli.listen_https,
        listen_http: cli.listen_http,
        server_addr: cli.server_addr,
        cert_file: cli.cert,
        key_file: cli.key,
        clipboard_dir: cli.clipboard_dir,
        key,
        file_size_limit: cli.file_size_limit,
        clipboard_size_limit: cli.clipboard_size_limit,
        clipboard_count_limit: cli.clipboard_count_limit,
        file_count_per_visitor_limit: cli.file_count_per_visitor_limit,
        file_expire_after: parse_duration("file-expire-after", &cli.file_expire_after)?,
        file_modes_allowed,
        manager_interval: parse_duration("manager-interval", &cli.manager_interval)?,
        visitor_window: parse_duration("visitor-window", &cli.visitor_window)?,
        fifo_rendezvous_timeout: parse_duration("fifo-rendezvous-timeout", &cli.fifo_rendezvous_timeout)?,
        request_timeout: parse_duration("request-timeout", &cli.request_timeout)?,
        trust_forwarded_header: cli.trust_forwarded_header,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = build_config(cli)?;

    std::fs::create_dir_all(&config.clipboard_dir)?;

    if config.key.is_none() {
        tracing::warn!("clipshare: running unauthenticated, set --password to require credentials");
    }

    clipshare_server::serve(config).await?;
    Ok(())
}
