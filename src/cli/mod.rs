mod app;
mod commands;
mod context;
mod crawl;
mod dispatch;
mod env;
mod runtime;
mod serve;

pub use app::run;
pub use crawl::CrawlArgs;
pub use env::CliArgs;
pub use runtime::{build_dispatcher, init_logging};
pub use serve::ServeArgs;
