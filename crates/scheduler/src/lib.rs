//! Host-keyed crawl scheduler.
//!
//! Tasks are queued per URL authority; each host's queue pauses a random
//! delay before every task and never runs two of its tasks at once, while
//! different hosts proceed independently.

pub mod api;
pub mod error;
pub mod executor;
pub mod lane;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod processor;
pub mod runtime;

pub use api::{CrawlScheduler, Dispatcher};
pub use error::SchedulerError;
pub use executor::TaskProcessor;
pub use model::{
    CompletionCallback, CrawlOutcome, CrawlRequest, SchedulerConfig, SubmitHandle, TaskWork,
};
pub use processor::PageTaskProcessor;
pub use runtime::QueueRegistry;
