use std::sync::Arc;

use action_flow::{Context, FlowError, Machine, Termination};
use async_trait::async_trait;
use cdp_adapter::steps::{inject, release_page};
use cdp_adapter::{AdapterError, PageHandle, PageProvider, PageSource, DATA_KEY, URL_KEY};
use politecrawl_core_types::{CrawlError, ScriptSource, TaskId};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::executor::TaskProcessor;
use crate::model::{CrawlOutcome, CrawlRequest, TaskWork};

/// Runs tasks against pages from a [`PageProvider`].
pub struct PageTaskProcessor {
    pages: Arc<dyn PageProvider>,
}

impl PageTaskProcessor {
    pub fn new(pages: Arc<dyn PageProvider>) -> Self {
        Self { pages }
    }

    async fn run_extract(&self, url: &Url, scripts: &[ScriptSource], extract: &str) -> CrawlOutcome {
        let mut page = PageHandle::acquire(self.pages.as_ref())
            .await
            .map_err(|err| CrawlError::PageUnavailable(err.to_string()))?;

        let outcome = pipeline(&mut page, url, scripts, extract).await;

        if let Err(err) = page.close().await {
            warn!(%url, %err, "failed to close page");
        }
        outcome
    }

    async fn run_program(&self, url: &Url, machine: &Machine) -> CrawlOutcome {
        let mut ctx = Context::new();
        ctx.insert_resource(PageSource(Arc::clone(&self.pages)));
        ctx.set(URL_KEY, Value::String(url.to_string()));

        let termination = machine.run(&mut ctx).await;
        release_page(&mut ctx).await;
        debug!(machine = %machine.name(), %termination, "program finished");

        if termination.is_success() {
            Ok(ctx.take(DATA_KEY).unwrap_or(Value::Null))
        } else {
            Err(termination_error(termination))
        }
    }
}

/// Open, inject in order, extract. The first failing stage ends the run.
async fn pipeline(
    page: &mut PageHandle,
    url: &Url,
    scripts: &[ScriptSource],
    extract: &str,
) -> CrawlOutcome {
    page.open(url.as_str())
        .await
        .map_err(|err| CrawlError::Navigation {
            url: url.to_string(),
            reason: err.to_string(),
        })?;

    for script in scripts {
        inject(page, script).await.map_err(|err| match err {
            AdapterError::Script { script, reason } => CrawlError::ScriptInjection { script, reason },
            other => CrawlError::ScriptInjection {
                script: script.to_string(),
                reason: other.to_string(),
            },
        })?;
    }

    page.evaluate(extract, &[])
        .await
        .map_err(|err| CrawlError::Extraction(err.to_string()))
}

fn termination_error(termination: Termination) -> CrawlError {
    match termination {
        Termination::NotFound(state) => CrawlError::StateNotFound(state),
        Termination::Error(FlowError::StateNotFound(state)) => CrawlError::StateNotFound(state),
        Termination::Error(FlowError::NoTransition { state, event }) => {
            CrawlError::NoTransition { state, event }
        }
        Termination::Error(err) => CrawlError::Machine {
            terminal: err.to_string(),
            cause: err.shared_payload(),
        },
        other => CrawlError::Machine {
            terminal: other.to_string(),
            cause: None,
        },
    }
}

#[async_trait]
impl TaskProcessor for PageTaskProcessor {
    async fn process(&self, id: &TaskId, request: &CrawlRequest) -> CrawlOutcome {
        debug!(task = %id, url = %request.url, work = ?request.work, "processing task");
        match &request.work {
            TaskWork::Extract { scripts, extract } => {
                self.run_extract(&request.url, scripts, extract).await
            }
            TaskWork::Program(machine) => self.run_program(&request.url, machine).await,
        }
    }
}
