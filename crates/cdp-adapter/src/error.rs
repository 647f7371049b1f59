use thiserror::Error;

/// Failures reported by a page controller.
#[derive(Clone, Debug, Error)]
pub enum AdapterError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("could not create page: {0}")]
    PageUnavailable(String),

    #[error("navigation to {url} failed: {status}")]
    Navigation { url: String, status: String },

    #[error("could not load script: {script}: {reason}")]
    Script { script: String, reason: String },

    #[error("evaluation failed: {0}")]
    Evaluation(String),

    #[error("page already closed")]
    Closed,

    #[error("cdp i/o failure: {0}")]
    Io(String),
}
