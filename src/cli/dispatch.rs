use super::crawl::cmd_crawl;
use super::env::CliArgs;
use super::serve::cmd_serve;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Crawl(args) => cmd_crawl(args, ctx).await,
        Commands::Serve(args) => cmd_serve(args, ctx).await,
    }
}
