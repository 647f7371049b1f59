use std::sync::Arc;

use anyhow::{Context, Result};
use cdp_adapter::PageProvider;
use politecrawl_scheduler::{CrawlScheduler, Dispatcher, PageTaskProcessor};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{AppConfig, LogFormat};

/// `RUST_LOG` wins when set; otherwise `level` (or DEBUG with `debug`).
pub fn init_logging(level: &str, debug: bool, format: LogFormat) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    }
    .context("failed to install tracing subscriber")?;

    Ok(())
}

/// Scheduler over the configured page provider.
pub fn build_dispatcher(config: &AppConfig) -> Result<Arc<dyn Dispatcher>> {
    let scheduler_config = config.scheduler.to_config()?;
    let pages = page_provider(config)?;
    let processor = Arc::new(PageTaskProcessor::new(pages));
    let scheduler = CrawlScheduler::new(processor, scheduler_config)?;
    info!(
        min_delay_ms = config.scheduler.min_delay_ms,
        max_delay_ms = config.scheduler.max_delay_ms,
        "crawl scheduler ready"
    );
    Ok(Arc::new(scheduler))
}

#[cfg(feature = "chromium")]
fn page_provider(config: &AppConfig) -> Result<Arc<dyn PageProvider>> {
    Ok(Arc::new(cdp_adapter::ChromiumProvider::new(
        config.browser.clone(),
    )))
}

#[cfg(not(feature = "chromium"))]
fn page_provider(_config: &AppConfig) -> Result<Arc<dyn PageProvider>> {
    anyhow::bail!("browser support is not built in; rebuild with `--features chromium`")
}
