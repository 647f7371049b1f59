use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use politecrawl_scheduler::Dispatcher;
use tokio::sync::OnceCell;

use super::runtime::build_dispatcher;
use crate::config::AppConfig;

pub struct CliContext {
    config: Arc<AppConfig>,
    config_path: Option<PathBuf>,
    dispatcher: OnceCell<Arc<dyn Dispatcher>>,
}

impl CliContext {
    pub fn new(config: AppConfig, config_path: Option<PathBuf>) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            dispatcher: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Scheduler shared by every command of this process, built on first use.
    pub async fn dispatcher(&self) -> Result<Arc<dyn Dispatcher>> {
        let dispatcher = self
            .dispatcher
            .get_or_try_init(|| async { build_dispatcher(self.config()) })
            .await?;
        Ok(Arc::clone(dispatcher))
    }
}
