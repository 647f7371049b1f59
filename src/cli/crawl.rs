use anyhow::{Context, Result};
use clap::Args;
use politecrawl_scheduler::CrawlRequest;
use tracing::info;

use super::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct CrawlArgs {
    /// Page to open
    pub url: String,

    /// Script to inject before extraction: an http(s) URL or a local file (repeatable, in order)
    #[arg(long = "script", value_name = "SRC")]
    pub scripts: Vec<String>,

    /// JavaScript function evaluated in the page; its return value is printed
    #[arg(long, value_name = "FUNCTION")]
    pub extract: String,
}

pub async fn cmd_crawl(args: CrawlArgs, ctx: &CliContext) -> Result<()> {
    let request = CrawlRequest::extract(&args.url, args.extract)
        .with_context(|| format!("cannot crawl {}", args.url))?
        .with_scripts(args.scripts);
    info!(url = %request.url, host = %request.host, "crawling");

    let dispatcher = ctx.dispatcher().await?;
    let value = dispatcher.crawl(request).await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
