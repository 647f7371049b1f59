use politecrawl_core_types::CrawlError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid scheduler config: {0}")]
    InvalidConfig(String),
    #[error("no async runtime to drive host queues")]
    NoRuntime,
    #[error(transparent)]
    Crawl(#[from] CrawlError),
}
