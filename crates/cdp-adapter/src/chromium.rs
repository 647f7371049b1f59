//! Chromium-backed pages over the DevTools protocol.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::EventLoadEventFired;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::OnceCell;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::CdpConfig;
use crate::error::AdapterError;
use crate::page::{read_local_script, PageController, PageProvider};

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Launches one browser on first use and hands out a fresh tab per request.
pub struct ChromiumProvider {
    config: CdpConfig,
    browser: OnceCell<Arc<Browser>>,
}

impl ChromiumProvider {
    pub fn new(config: CdpConfig) -> Self {
        Self {
            config,
            browser: OnceCell::new(),
        }
    }

    async fn browser(&self) -> Result<&Arc<Browser>, AdapterError> {
        self.browser
            .get_or_try_init(|| launch(&self.config))
            .await
    }
}

fn browser_config(cfg: &CdpConfig) -> Result<BrowserConfig, AdapterError> {
    let mut builder = BrowserConfig::builder();
    if !cfg.headless {
        builder = builder.with_head();
    }
    if let Some(executable) = cfg.resolve_executable() {
        builder = builder.chrome_executable(executable);
    }
    if let Some(dir) = &cfg.user_data_dir {
        builder = builder.user_data_dir(dir.clone());
    }
    builder
        .build()
        .map_err(|err| AdapterError::Launch(format!("browser config error: {err}")))
}

async fn launch(cfg: &CdpConfig) -> Result<Arc<Browser>, AdapterError> {
    let config = browser_config(cfg)?;
    let (browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|err| AdapterError::Launch(err.to_string()))?;

    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(err) = event {
                warn!(target: "cdp-transport", %err, "browser handler stopped");
                break;
            }
        }
    });

    info!(headless = cfg.headless, "browser launched");
    Ok(Arc::new(browser))
}

#[async_trait]
impl PageProvider for ChromiumProvider {
    async fn new_page(&self) -> Result<Box<dyn PageController>, AdapterError> {
        let browser = self.browser().await?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|err| AdapterError::PageUnavailable(err.to_string()))?;
        Ok(Box::new(ChromiumPage { page: Some(page) }))
    }
}

pub struct ChromiumPage {
    page: Option<Page>,
}

impl ChromiumPage {
    fn page(&self) -> Result<&Page, AdapterError> {
        self.page.as_ref().ok_or(AdapterError::Closed)
    }

    async fn run(&self, expression: String, await_promise: bool) -> Result<Value, AdapterError> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(await_promise)
            .return_by_value(true)
            .build()
            .map_err(AdapterError::Evaluation)?;
        let result = self
            .page()?
            .evaluate_expression(params)
            .await
            .map_err(|err| AdapterError::Evaluation(err.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }
}

fn call_expression(function: &str, args: &[Value]) -> String {
    let args = args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("({function})({args})")
}

fn include_expression(url: &str) -> String {
    let url = Value::String(url.to_string());
    format!(
        "new Promise((resolve, reject) => {{ \
            const script = document.createElement('script'); \
            script.src = {url}; \
            script.onload = () => resolve(true); \
            script.onerror = () => reject(new Error('failed to load ' + {url})); \
            document.head.appendChild(script); \
        }})"
    )
}

#[async_trait]
impl PageController for ChromiumPage {
    async fn open(&mut self, url: &str) -> Result<(), AdapterError> {
        self.page()?
            .goto(url)
            .await
            .map_err(|err| AdapterError::Navigation {
                url: url.to_string(),
                status: err.to_string(),
            })?;
        Ok(())
    }

    async fn inject_local(&mut self, path: &Path) -> Result<bool, AdapterError> {
        let source = match read_local_script(path).await {
            Ok(source) => source,
            Err(err) => {
                debug!(%err, "local script unreadable");
                return Ok(false);
            }
        };
        match self.run(source, false).await {
            Ok(_) => Ok(true),
            Err(err) => {
                debug!(script = %path.display(), %err, "page rejected script");
                Ok(false)
            }
        }
    }

    async fn include_remote(&mut self, url: &str) -> Result<(), AdapterError> {
        self.run(include_expression(url), true)
            .await
            .map(|_| ())
            .map_err(|err| AdapterError::Script {
                script: url.to_string(),
                reason: err.to_string(),
            })
    }

    async fn evaluate(&mut self, function: &str, args: &[Value]) -> Result<Value, AdapterError> {
        self.run(call_expression(function, args), true).await
    }

    async fn navigate(&mut self, function: &str, args: &[Value]) -> Result<(), AdapterError> {
        let navigation_failed = |status: String| AdapterError::Navigation {
            url: "<in-page navigation>".to_string(),
            status,
        };
        let mut loads = self
            .page()?
            .event_listener::<EventLoadEventFired>()
            .await
            .map_err(|err| navigation_failed(err.to_string()))?;

        self.run(call_expression(function, args), true).await?;

        match timeout(NAVIGATION_TIMEOUT, loads.next()).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(navigation_failed("page closed before load".to_string())),
            Err(_) => Err(navigation_failed(format!(
                "no load event within {}s",
                NAVIGATION_TIMEOUT.as_secs()
            ))),
        }
    }

    async fn close(&mut self) -> Result<(), AdapterError> {
        match self.page.take() {
            Some(page) => page
                .close()
                .await
                .map_err(|err| AdapterError::Io(err.to_string())),
            None => Ok(()),
        }
    }
}
