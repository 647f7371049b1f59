//! Entry actions that drive a page kept in the machine context.
//!
//! A program seeds the context with a [`PageSource`] (and usually the target
//! url under [`URL_KEY`]); [`create_page`] acquires a [`PageHandle`] that the
//! remaining steps share until [`close_page`] or [`release_page`] frees it.

use std::sync::Arc;
use std::time::Duration;

use action_flow::{Context, EntryAction, Event};
use anyhow::{anyhow, Context as _};
use async_trait::async_trait;
use politecrawl_core_types::ScriptSource;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::AdapterError;
use crate::page::{PageHandle, PageProvider};

/// Context key holding the url a program was submitted for.
pub const URL_KEY: &str = "url";
/// Context key a program stores its result under.
pub const DATA_KEY: &str = "data";

pub const LOADED: &str = "loaded";
pub const INJECTED: &str = "injected";
pub const WAITED: &str = "waited";

/// Page provider available to [`create_page`].
#[derive(Clone)]
pub struct PageSource(pub Arc<dyn PageProvider>);

type StoreFn = dyn Fn(&mut Context, Value) + Send + Sync;

fn page_mut(ctx: &mut Context) -> anyhow::Result<&mut PageHandle> {
    ctx.resource_mut::<PageHandle>()
        .ok_or_else(|| anyhow!("no page in context; run create_page first"))
}

/// Close and drop the context's page, if any.
pub async fn release_page(ctx: &mut Context) {
    if let Some(mut page) = ctx.take_resource::<PageHandle>() {
        if let Err(err) = page.close().await {
            warn!(%err, "failed to close page");
        }
    }
}

pub struct CreatePage;

#[async_trait]
impl EntryAction for CreatePage {
    async fn on_entry(&self, ctx: &mut Context) -> anyhow::Result<Event> {
        let source = ctx
            .resource::<PageSource>()
            .cloned()
            .context("no page source in context")?;
        let page = PageHandle::acquire(source.0.as_ref()).await?;
        release_page(ctx).await;
        ctx.insert_resource(page);
        Ok(Event::Undefined)
    }
}

/// Acquire a page; emits `Undefined`.
pub fn create_page() -> CreatePage {
    CreatePage
}

pub struct LoadPage {
    url: Option<String>,
}

#[async_trait]
impl EntryAction for LoadPage {
    async fn on_entry(&self, ctx: &mut Context) -> anyhow::Result<Event> {
        let url = match &self.url {
            Some(url) => url.clone(),
            None => ctx
                .get(URL_KEY)
                .and_then(Value::as_str)
                .map(str::to_string)
                .context("no url in context")?,
        };
        debug!(%url, "loading page");
        match page_mut(ctx)?.open(&url).await {
            Ok(()) => Ok(Event::named(LOADED)),
            Err(err) => Ok(Event::error(err)),
        }
    }
}

/// Open `url`; emits `loaded` or an error event.
pub fn load_page(url: impl Into<String>) -> LoadPage {
    LoadPage {
        url: Some(url.into()),
    }
}

/// Open the url stored under [`URL_KEY`].
pub fn load_context_url() -> LoadPage {
    LoadPage { url: None }
}

pub struct InjectScripts {
    scripts: Vec<ScriptSource>,
}

#[async_trait]
impl EntryAction for InjectScripts {
    async fn on_entry(&self, ctx: &mut Context) -> anyhow::Result<Event> {
        let page = page_mut(ctx)?;
        for script in &self.scripts {
            if let Err(err) = inject(page, script).await {
                return Ok(Event::error(err));
            }
        }
        Ok(Event::named(INJECTED))
    }
}

/// Load `script` into `page`, remote sources over the network and local ones
/// from disk.
pub async fn inject(page: &mut PageHandle, script: &ScriptSource) -> Result<(), AdapterError> {
    match script {
        ScriptSource::Remote(url) => {
            page.include_remote(url)
                .await
                .map_err(|err| AdapterError::Script {
                    script: url.clone(),
                    reason: err.to_string(),
                })
        }
        ScriptSource::Local(path) => match page.inject_local(path).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AdapterError::Script {
                script: path.display().to_string(),
                reason: "page rejected the script".to_string(),
            }),
            Err(err) => Err(AdapterError::Script {
                script: path.display().to_string(),
                reason: err.to_string(),
            }),
        },
    }
}

/// Inject `scripts` in order, stopping at the first failure; emits
/// `injected` or an error event naming the script.
pub fn inject_scripts<I, S>(scripts: I) -> InjectScripts
where
    I: IntoIterator<Item = S>,
    S: Into<ScriptSource>,
{
    InjectScripts {
        scripts: scripts.into_iter().map(Into::into).collect(),
    }
}

pub struct ExtractData {
    store: Arc<StoreFn>,
    function: String,
    args: Vec<Value>,
}

#[async_trait]
impl EntryAction for ExtractData {
    async fn on_entry(&self, ctx: &mut Context) -> anyhow::Result<Event> {
        let data = page_mut(ctx)?.evaluate(&self.function, &self.args).await?;
        (self.store)(ctx, data);
        Ok(Event::Undefined)
    }
}

/// Evaluate `function` and hand its result to `store`; emits `Undefined`.
pub fn extract_data<F>(store: F, function: impl Into<String>) -> ExtractData
where
    F: Fn(&mut Context, Value) + Send + Sync + 'static,
{
    ExtractData {
        store: Arc::new(store),
        function: function.into(),
        args: Vec::new(),
    }
}

impl ExtractData {
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }
}

/// Store function replacing [`DATA_KEY`] with the extracted value.
pub fn store_data(ctx: &mut Context, data: Value) {
    ctx.set(DATA_KEY, data);
}

/// Store function concatenating extracted arrays under [`DATA_KEY`].
pub fn append_data(ctx: &mut Context, data: Value) {
    let items = match data {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    };
    match ctx.get_mut(DATA_KEY) {
        Some(Value::Array(existing)) => existing.extend(items),
        _ => {
            ctx.set(DATA_KEY, Value::Array(items));
        }
    }
}

pub struct Execute {
    function: String,
    args: Vec<Value>,
}

#[async_trait]
impl EntryAction for Execute {
    async fn on_entry(&self, ctx: &mut Context) -> anyhow::Result<Event> {
        let value = page_mut(ctx)?.evaluate(&self.function, &self.args).await?;
        Ok(event_from_value(value))
    }
}

/// Evaluate `function` and emit its return value as the event.
pub fn execute(function: impl Into<String>) -> Execute {
    Execute {
        function: function.into(),
        args: Vec::new(),
    }
}

impl Execute {
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }
}

fn event_from_value(value: Value) -> Event {
    match value {
        Value::Null | Value::Bool(false) => Event::Undefined,
        // NaN never reaches us; CDP reports it as null.
        Value::Number(number) if number.as_f64() == Some(0.0) => Event::Undefined,
        Value::String(name) if name.is_empty() => Event::Undefined,
        Value::String(name) => Event::Named(name),
        other => Event::Named(other.to_string()),
    }
}

pub struct Navigate {
    function: String,
    args: Vec<Value>,
}

#[async_trait]
impl EntryAction for Navigate {
    async fn on_entry(&self, ctx: &mut Context) -> anyhow::Result<Event> {
        match page_mut(ctx)?.navigate(&self.function, &self.args).await {
            Ok(()) => Ok(Event::named(LOADED)),
            Err(err) => Ok(Event::error(err)),
        }
    }
}

/// Evaluate a function that makes the page navigate and wait for the new
/// page to load; emits `loaded` or an error event.
pub fn navigate(function: impl Into<String>) -> Navigate {
    Navigate {
        function: function.into(),
        args: Vec::new(),
    }
}

impl Navigate {
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }
}

pub struct Wait {
    duration: Duration,
}

#[async_trait]
impl EntryAction for Wait {
    async fn on_entry(&self, _ctx: &mut Context) -> anyhow::Result<Event> {
        tokio::time::sleep(self.duration).await;
        Ok(Event::named(WAITED))
    }
}

/// Emit `waited` after `duration`.
pub fn wait(duration: Duration) -> Wait {
    Wait { duration }
}

pub struct ClosePage;

#[async_trait]
impl EntryAction for ClosePage {
    async fn on_entry(&self, ctx: &mut Context) -> anyhow::Result<Event> {
        release_page(ctx).await;
        Ok(Event::Undefined)
    }
}

/// Release the context's page; emits `Undefined`.
pub fn close_page() -> ClosePage {
    ClosePage
}
