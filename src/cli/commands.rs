use clap::Subcommand;

use super::crawl::CrawlArgs;
use super::serve::ServeArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Crawl one page and print the extracted data as JSON
    Crawl(CrawlArgs),

    /// Serve named crawlers and static files over HTTP
    Serve(ServeArgs),
}
