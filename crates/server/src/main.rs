//! prerender-server: HTTP front for the render pipeline

mod routes;
mod settings;

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use browser::BrowserPool;
use prerender::{HttpObjectStore, RenderPipeline};

use crate::settings::Settings;

#[derive(Parser, Debug)]
#[command(
    name = "prerender-server",
    version,
    about = "Render pages of allowed domains to self-contained HTML"
)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "PRERENDER_LISTEN", default_value = "127.0.0.1:3000")]
    listen: SocketAddr,

    /// JSON settings file with `render` and `browser` sections
    #[arg(short, long, env = "PRERENDER_CONFIG")]
    config: Option<PathBuf>,

    /// Chrome binary
    #[arg(long, env = "CHROME_BIN")]
    chrome: Option<PathBuf>,

    /// Attach to a running browser instead of launching one
    #[arg(long, env = "CHROME_WS_URL")]
    ws_url: Option<String>,

    /// Object storage endpoint for oversized renders
    #[arg(long, env = "PRERENDER_STORAGE_ENDPOINT")]
    storage_endpoint: Option<String>,

    #[arg(long, env = "PRERENDER_BUCKET")]
    bucket: Option<String>,

    /// Show the browser window
    #[arg(long)]
    headful: bool,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let mut settings = Settings::load(cli.config.as_deref())?;
    settings.apply_overrides(
        cli.chrome,
        cli.ws_url,
        cli.storage_endpoint,
        cli.bucket,
        cli.headful,
    );

    let pool = Arc::new(BrowserPool::new(settings.browser));
    let storage = Arc::new(
        HttpObjectStore::new(settings.render.storage.clone())
            .context("Failed to build storage client")?,
    );
    let pipeline = RenderPipeline::new(pool, storage, settings.render)
        .context("Invalid render configuration")?;

    let app = routes::router(Arc::new(pipeline));
    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("Failed to bind {}", cli.listen))?;

    tracing::info!("Listening on http://{}/", cli.listen);
    tracing::info!("  - Render: http://{}/render?url=<target>", cli.listen);
    tracing::info!("  - Health: http://{}/healthz", cli.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
