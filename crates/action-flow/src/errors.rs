//! Machine error types

use std::sync::Arc;

use thiserror::Error;

/// Errors that terminate a machine or travel through it as error events.
///
/// Every variant raised from an entry action keeps the original payload.
#[derive(Debug, Clone, Error)]
pub enum FlowError {
    /// A transition named a state missing from the machine's namespace
    #[error("state {0} not found")]
    StateNotFound(String),

    /// Exact-match machines have no fallthrough
    #[error("no transition from state {state} for event {event}")]
    NoTransition { state: String, event: String },

    /// An entry action emitted an explicit error event
    #[error("error event: {cause}")]
    Emitted { cause: Arc<anyhow::Error> },

    /// An entry action returned an error
    #[error("state {state} failed: {cause}")]
    Raised {
        state: String,
        cause: Arc<anyhow::Error>,
    },

    /// An entry action panicked
    #[error("state {state} panicked: {message}")]
    Panicked { state: String, message: String },

    /// A submachine finished with a terminal its outer machine cannot route
    #[error("submachine {name} terminated with {terminal}")]
    Submachine { name: String, terminal: String },

    /// Machine failed structural validation
    #[error("invalid machine structure: {0}")]
    InvalidStructure(String),
}

impl FlowError {
    pub fn emitted(cause: impl Into<anyhow::Error>) -> Self {
        Self::Emitted {
            cause: Arc::new(cause.into()),
        }
    }

    /// Original error value raised or emitted by an entry action.
    pub fn payload(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Emitted { cause } | Self::Raised { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }

    pub fn shared_payload(&self) -> Option<Arc<anyhow::Error>> {
        match self {
            Self::Emitted { cause } | Self::Raised { cause, .. } => Some(Arc::clone(cause)),
            _ => None,
        }
    }
}
