use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use action_flow::Machine;
use politecrawl_core_types::{CrawlError, Host, ScriptSource, TaskId};
use rand::Rng;
use serde_json::Value;
use tokio::sync::oneshot;
use url::Url;

use crate::SchedulerError;

/// Result delivered to a task's completion.
pub type CrawlOutcome = Result<Value, CrawlError>;

/// Bounds of the randomized pause a host queue takes before each task.
#[derive(Clone, Copy, Debug)]
pub struct SchedulerConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(300),
            max_delay: Duration::from_millis(1000),
        }
    }
}

impl SchedulerConfig {
    /// No pause between tasks; ordering guarantees still hold.
    pub fn immediate() -> Self {
        Self {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    pub fn from_millis(min_ms: u64, max_ms: u64) -> Result<Self, SchedulerError> {
        let config = Self {
            min_delay: Duration::from_millis(min_ms),
            max_delay: Duration::from_millis(max_ms),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.min_delay > self.max_delay {
            return Err(SchedulerError::InvalidConfig(format!(
                "min_delay {:?} exceeds max_delay {:?}",
                self.min_delay, self.max_delay
            )));
        }
        Ok(())
    }

    /// Uniformly random delay in `[min_delay, max_delay]`.
    pub fn next_delay(&self) -> Duration {
        if self.min_delay >= self.max_delay {
            return self.min_delay;
        }
        rand::thread_rng().gen_range(self.min_delay..=self.max_delay)
    }
}

/// What a task does once its page is open.
#[derive(Clone)]
pub enum TaskWork {
    /// Open the url, inject scripts in order, evaluate `extract`.
    Extract {
        scripts: Vec<ScriptSource>,
        extract: String,
    },
    /// Run a machine whose context is seeded with the page source and url;
    /// its `data` value is the result.
    Program(Arc<Machine>),
}

impl fmt::Debug for TaskWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extract { scripts, .. } => f
                .debug_struct("Extract")
                .field("scripts", scripts)
                .finish_non_exhaustive(),
            Self::Program(machine) => f.debug_tuple("Program").field(&machine.name()).finish(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CrawlRequest {
    pub url: Url,
    pub host: Host,
    pub work: TaskWork,
}

impl CrawlRequest {
    pub fn extract(url: &str, extract: impl Into<String>) -> Result<Self, CrawlError> {
        let (url, host) = Host::parse(url)?;
        Ok(Self {
            url,
            host,
            work: TaskWork::Extract {
                scripts: Vec::new(),
                extract: extract.into(),
            },
        })
    }

    pub fn program(url: &str, machine: Machine) -> Result<Self, CrawlError> {
        let (url, host) = Host::parse(url)?;
        Ok(Self {
            url,
            host,
            work: TaskWork::Program(Arc::new(machine)),
        })
    }

    /// Append a script to inject before extraction. Ignored for programs.
    pub fn with_script(mut self, script: impl Into<ScriptSource>) -> Self {
        if let TaskWork::Extract { scripts, .. } = &mut self.work {
            scripts.push(script.into());
        }
        self
    }

    pub fn with_scripts<I, S>(self, scripts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ScriptSource>,
    {
        scripts
            .into_iter()
            .fold(self, |request, script| request.with_script(script))
    }
}

pub type CompletionCallback = Box<dyn FnOnce(CrawlOutcome) + Send + 'static>;

enum Sink {
    Channel(oneshot::Sender<CrawlOutcome>),
    Callback(CompletionCallback),
}

/// Fires a task's outcome exactly once.
///
/// A completion dropped without firing reports [`CrawlError::Abandoned`].
pub struct Completion {
    sink: Option<Sink>,
}

impl Completion {
    pub fn channel() -> (Self, oneshot::Receiver<CrawlOutcome>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sink: Some(Sink::Channel(tx)),
            },
            rx,
        )
    }

    pub fn callback(callback: CompletionCallback) -> Self {
        Self {
            sink: Some(Sink::Callback(callback)),
        }
    }

    pub fn complete(mut self, outcome: CrawlOutcome) {
        self.fire(outcome);
    }

    /// Drop without firing; used when the task was never accepted.
    pub fn discard(mut self) {
        self.sink = None;
    }

    fn fire(&mut self, outcome: CrawlOutcome) {
        match self.sink.take() {
            Some(Sink::Channel(tx)) => {
                let _ = tx.send(outcome);
            }
            Some(Sink::Callback(callback)) => callback(outcome),
            None => {}
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        self.fire(Err(CrawlError::Abandoned));
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("pending", &self.sink.is_some())
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct TaskTimeline {
    pub enqueued_at: Instant,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
}

impl Default for TaskTimeline {
    fn default() -> Self {
        Self {
            enqueued_at: Instant::now(),
            started_at: None,
            finished_at: None,
        }
    }
}

impl TaskTimeline {
    /// Queue wait and run time in milliseconds.
    pub fn durations(&self) -> (u64, u64) {
        let wait_ms = self
            .started_at
            .map(|start| start.duration_since(self.enqueued_at).as_millis() as u64)
            .unwrap_or(0);
        let run_ms = match (self.started_at, self.finished_at) {
            (Some(start), Some(finish)) => finish.duration_since(start).as_millis() as u64,
            _ => 0,
        };
        (wait_ms, run_ms)
    }
}

#[derive(Debug)]
pub struct CrawlTask {
    pub id: TaskId,
    pub request: CrawlRequest,
    pub completion: Completion,
    pub timeline: TaskTimeline,
}

impl CrawlTask {
    pub fn new(request: CrawlRequest, completion: Completion) -> Self {
        Self {
            id: TaskId::new(),
            request,
            completion,
            timeline: TaskTimeline::default(),
        }
    }
}

pub struct SubmitHandle {
    pub task_id: TaskId,
    pub receiver: oneshot::Receiver<CrawlOutcome>,
}

impl SubmitHandle {
    pub async fn outcome(self) -> CrawlOutcome {
        self.receiver.await.unwrap_or(Err(CrawlError::Abandoned))
    }
}
