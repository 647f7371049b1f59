use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use politecrawl_core_types::{CrawlError, TaskId};
use tokio::runtime::Handle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::executor::TaskProcessor;
use crate::lane::HostQueue;
use crate::metrics;
use crate::model::{Completion, CrawlRequest, CrawlTask, SchedulerConfig};
use crate::runtime::QueueRegistry;
use crate::SchedulerError;

/// Routes tasks to their host queue and arms a driver for idle queues.
pub struct Orchestrator<P>
where
    P: TaskProcessor + 'static,
{
    registry: Arc<QueueRegistry>,
    processor: Arc<P>,
    config: SchedulerConfig,
}

impl<P> Orchestrator<P>
where
    P: TaskProcessor + 'static,
{
    pub fn new(registry: Arc<QueueRegistry>, processor: Arc<P>, config: SchedulerConfig) -> Self {
        Self {
            registry,
            processor,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<QueueRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Queue `request` behind earlier tasks for the same host.
    ///
    /// Returns before any processing happens; `completion` always fires
    /// later, from the host's driver. A rejected submission never fires it.
    pub fn submit(
        &self,
        request: CrawlRequest,
        completion: Completion,
    ) -> Result<TaskId, SchedulerError> {
        let Ok(runtime) = Handle::try_current() else {
            completion.discard();
            return Err(SchedulerError::NoRuntime);
        };
        let task = CrawlTask::new(request, completion);
        let task_id = task.id.clone();
        let queue = self.registry.queue_for(&task.request.host);
        metrics::record_enqueued();
        debug!(target: "scheduler", host = %queue.host(), task = %task_id, "task enqueued");

        if queue.push(task) {
            runtime.spawn(drive(queue, Arc::clone(&self.processor), self.config));
        }
        Ok(task_id)
    }
}

/// Per-host loop: pause, run the head task, repeat until the queue drains.
async fn drive<P>(queue: Arc<HostQueue>, processor: Arc<P>, config: SchedulerConfig)
where
    P: TaskProcessor + ?Sized,
{
    debug!(target: "scheduler", host = %queue.host(), "host queue armed");
    loop {
        sleep(config.next_delay()).await;
        if let Some(task) = queue.pop() {
            run_task(&queue, processor.as_ref(), task).await;
        }
        if queue.disarm_if_idle() {
            debug!(target: "scheduler", host = %queue.host(), "host queue idle");
            return;
        }
    }
}

async fn run_task<P>(queue: &HostQueue, processor: &P, mut task: CrawlTask)
where
    P: TaskProcessor + ?Sized,
{
    task.timeline.started_at = Some(Instant::now());
    metrics::record_started();
    debug!(
        target: "scheduler",
        host = %queue.host(),
        task = %task.id,
        url = %task.request.url,
        pending = queue.len(),
        "task started"
    );

    let outcome = match AssertUnwindSafe(processor.process(&task.id, &task.request))
        .catch_unwind()
        .await
    {
        Ok(outcome) => outcome,
        Err(panic) => Err(CrawlError::Machine {
            terminal: format!("panicked: {}", panic_message(panic.as_ref())),
            cause: None,
        }),
    };

    task.timeline.finished_at = Some(Instant::now());
    let (wait_ms, run_ms) = task.timeline.durations();
    match &outcome {
        Ok(_) => {
            metrics::record_completed();
            info!(
                target: "scheduler",
                host = %queue.host(),
                task = %task.id,
                wait_ms,
                run_ms,
                "task completed"
            );
        }
        Err(err) => {
            metrics::record_failed();
            warn!(
                target: "scheduler",
                host = %queue.host(),
                task = %task.id,
                wait_ms,
                run_ms,
                error = %err,
                "task failed"
            );
        }
    }
    let completion = task.completion;
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || completion.complete(outcome))) {
        warn!(
            target: "scheduler",
            host = %queue.host(),
            task = %task.id,
            panic = %panic_message(payload.as_ref()),
            "completion callback panicked"
        );
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "task processor panicked".to_string()
    }
}
