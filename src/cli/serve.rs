use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::context::CliContext;
use crate::crawlers::CrawlerCatalog;
use crate::server::{build_router, ServeState};

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Port to listen on (overrides `server.port`)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory served for paths outside the crawler base
    #[arg(long = "static-root", value_name = "DIR")]
    pub static_root: Option<PathBuf>,

    /// Directory holding `<name>.yaml` crawler definitions
    #[arg(long = "crawler-dir", value_name = "DIR")]
    pub crawler_dir: Option<PathBuf>,
}

pub async fn cmd_serve(args: ServeArgs, ctx: &CliContext) -> Result<()> {
    let section = &ctx.config().server;
    let port = args.port.unwrap_or(section.port);
    let static_root = args.static_root.or_else(|| section.static_root.clone());
    let crawler_dir = args
        .crawler_dir
        .unwrap_or_else(|| section.crawler_dir.clone());

    if !crawler_dir.is_dir() {
        warn!(
            "Crawler directory {} does not exist; every crawler lookup will 404",
            crawler_dir.display()
        );
    }
    if let Some(path) = ctx.config_path() {
        info!("Serving with configuration from {}", path.display());
    }

    let dispatcher = ctx.dispatcher().await?;
    let state = ServeState::new(
        dispatcher,
        CrawlerCatalog::new(&crawler_dir),
        section.public_base.clone(),
        static_root.clone(),
    );
    let public_base = state.public_base.clone();
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        %addr,
        crawlers = %crawler_dir.display(),
        base = %public_base,
        static_root = ?static_root,
        "politecrawl listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
