use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use loopcast::{RelayServer, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "loopcast")]
#[command(about = "Paced audio relay: upload a file, listeners hear it on loop", long_about = None)]
struct Args {
    /// HTTP port
    #[arg(long, env = "PORT", default_value = "8080")]
    port: u16,

    /// Address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Base URL used in playback links (defaults to http://<host>:<port>)
    #[arg(long, env = "IP")]
    public_url: Option<String>,

    /// Directory uploads are stored in
    #[arg(long, env = "UPLOAD_DIR", default_value = "./uploads/")]
    upload_dir: PathBuf,

    /// Bytes read and broadcast per tick
    #[arg(long, env = "CHUNK_SIZE", default_value = "8192")]
    chunk_size: usize,

    /// Milliseconds between ticks
    #[arg(long, env = "TICK_MS", default_value = "150")]
    tick_ms: u64,

    /// Largest accepted upload in MiB
    #[arg(long, env = "MAX_UPLOAD_MB", default_value = "500")]
    max_upload_mb: u64,

    /// Do not resume the newest stored upload on startup
    #[arg(long)]
    no_resume: bool,

    /// Log filter directive
    #[arg(long, env = "LOG_FILTER", default_value = "loopcast=info")]
    log_filter: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(args.log_filter.parse().context("invalid log filter")?),
        )
        .init();

    let bind_addr = SocketAddr::new(args.host, args.port);
    let public_url = args
        .public_url
        .clone()
        .unwrap_or_else(|| format!("http://{bind_addr}"));

    let mut config = ServerConfig::with_addr(bind_addr)
        .public_url(public_url)
        .upload_dir(args.upload_dir.clone())
        .chunk_size(args.chunk_size)
        .tick_period(Duration::from_millis(args.tick_ms))
        .max_source_size(args.max_upload_mb.saturating_mul(1024 * 1024));
    if args.no_resume {
        config = config.disable_resume();
    }

    info!(
        chunk_size = args.chunk_size,
        tick_ms = args.tick_ms,
        max_upload_mb = args.max_upload_mb,
        "Starting loopcast"
    );
    info!("  Upload: POST http://{}/upload (field \"file\")", bind_addr);
    info!("  Listen: GET  http://{}/stream?path=<id>", bind_addr);

    let server = RelayServer::new(config).context("invalid configuration")?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Received shutdown signal");
        })
        .await?;

    info!("Relay stopped");
    Ok(())
}
