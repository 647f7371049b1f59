use std::sync::Arc;

use thiserror::Error;

/// Failure delivered to a crawl task's completion.
#[derive(Debug, Clone, Error)]
pub enum CrawlError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("no page available: {0}")]
    PageUnavailable(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("script {script} could not be loaded: {reason}")]
    ScriptInjection { script: String, reason: String },

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("state {0} not found")]
    StateNotFound(String),

    #[error("no transition from state {state} for event {event}")]
    NoTransition { state: String, event: String },

    #[error("machine terminated with {terminal}")]
    Machine {
        terminal: String,
        cause: Option<Arc<anyhow::Error>>,
    },

    #[error("task was dropped before completing")]
    Abandoned,
}

impl CrawlError {
    /// Original error carried by a machine failure, if any.
    pub fn payload(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Machine { cause, .. } => cause.as_deref(),
            _ => None,
        }
    }

    /// Script that failed to load, for injection failures.
    pub fn failed_script(&self) -> Option<&str> {
        match self {
            Self::ScriptInjection { script, .. } => Some(script),
            _ => None,
        }
    }
}
