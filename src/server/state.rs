use std::path::PathBuf;
use std::sync::Arc;

use politecrawl_scheduler::Dispatcher;

use crate::crawlers::CrawlerCatalog;

#[derive(Clone)]
pub struct ServeState {
    pub dispatcher: Arc<dyn Dispatcher>,
    pub catalog: Arc<CrawlerCatalog>,
    /// Path prefix crawler names are mounted under, e.g. `/crawler`
    pub public_base: String,
    pub static_root: Option<PathBuf>,
}

impl ServeState {
    pub fn new(
        dispatcher: Arc<dyn Dispatcher>,
        catalog: CrawlerCatalog,
        public_base: impl Into<String>,
        static_root: Option<PathBuf>,
    ) -> Self {
        let public_base = public_base.into();
        let trimmed = public_base.trim_end_matches('/');
        let public_base = if trimmed.is_empty() || trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        };
        Self {
            dispatcher,
            catalog: Arc::new(catalog),
            public_base,
            static_root,
        }
    }
}
