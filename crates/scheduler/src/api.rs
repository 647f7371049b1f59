use crate::executor::TaskProcessor;
use crate::model::{Completion, CompletionCallback, CrawlRequest, SchedulerConfig, SubmitHandle};
use crate::orchestrator::Orchestrator;
use crate::runtime::QueueRegistry;
use crate::SchedulerError;
use async_trait::async_trait;
use politecrawl_core_types::TaskId;
use serde_json::Value;
use std::sync::Arc;

/// Submission API shared by the CLI and the HTTP surface.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Queue a task; its outcome arrives on the returned handle.
    async fn submit(&self, request: CrawlRequest) -> Result<SubmitHandle, SchedulerError>;

    /// Queue a task whose outcome is handed to `callback`, exactly once and
    /// never before this call returns.
    ///
    /// When this returns `Err` the task was never accepted and `callback` is
    /// dropped without being called; the error is the only report.
    async fn submit_with(
        &self,
        request: CrawlRequest,
        callback: CompletionCallback,
    ) -> Result<TaskId, SchedulerError>;

    /// Submit and wait for the result.
    async fn crawl(&self, request: CrawlRequest) -> Result<Value, SchedulerError> {
        let handle = self.submit(request).await?;
        Ok(handle.outcome().await?)
    }
}

/// Owns the host queues of one scheduling domain.
pub struct CrawlScheduler<P>
where
    P: TaskProcessor + 'static,
{
    orchestrator: Orchestrator<P>,
}

impl<P> CrawlScheduler<P>
where
    P: TaskProcessor + 'static,
{
    pub fn new(processor: Arc<P>, config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate()?;
        let registry = Arc::new(QueueRegistry::new());
        Ok(Self {
            orchestrator: Orchestrator::new(registry, processor, config),
        })
    }

    pub fn registry(&self) -> &Arc<QueueRegistry> {
        self.orchestrator.registry()
    }

    pub fn config(&self) -> &SchedulerConfig {
        self.orchestrator.config()
    }
}

#[async_trait]
impl<P> Dispatcher for CrawlScheduler<P>
where
    P: TaskProcessor + 'static,
{
    async fn submit(&self, request: CrawlRequest) -> Result<SubmitHandle, SchedulerError> {
        let (completion, receiver) = Completion::channel();
        let task_id = self.orchestrator.submit(request, completion)?;
        Ok(SubmitHandle { task_id, receiver })
    }

    async fn submit_with(
        &self,
        request: CrawlRequest,
        callback: CompletionCallback,
    ) -> Result<TaskId, SchedulerError> {
        self.orchestrator
            .submit(request, Completion::callback(callback))
    }
}

#[async_trait]
impl<D> Dispatcher for Arc<D>
where
    D: Dispatcher + ?Sized,
{
    async fn submit(&self, request: CrawlRequest) -> Result<SubmitHandle, SchedulerError> {
        (**self).submit(request).await
    }

    async fn submit_with(
        &self,
        request: CrawlRequest,
        callback: CompletionCallback,
    ) -> Result<TaskId, SchedulerError> {
        (**self).submit_with(request, callback).await
    }

    async fn crawl(&self, request: CrawlRequest) -> Result<Value, SchedulerError> {
        (**self).crawl(request).await
    }
}
