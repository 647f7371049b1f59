use async_trait::async_trait;
use politecrawl_core_types::TaskId;

use crate::model::{CrawlOutcome, CrawlRequest};

/// Runs one dequeued task to its outcome.
///
/// Implementations must release every resource they acquire before
/// returning; the driver fires the task's completion with the result.
#[async_trait]
pub trait TaskProcessor: Send + Sync {
    async fn process(&self, id: &TaskId, request: &CrawlRequest) -> CrawlOutcome;
}

#[async_trait]
impl<P> TaskProcessor for std::sync::Arc<P>
where
    P: TaskProcessor + ?Sized,
{
    async fn process(&self, id: &TaskId, request: &CrawlRequest) -> CrawlOutcome {
        (**self).process(id, request).await
    }
}
