//! Agent Core error types.

use thiserror::Error;

use crate::inference::errors::InferenceError;

/// Errors that end an agent run.
///
/// Per-tool failures never show up here: they are recorded in the
/// conversation so the model can react. Only abort, the pass limit and
/// failures outside tool dispatch propagate to the caller.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The abort signal fired.
    #[error("aborted")]
    Aborted,

    /// The model kept requesting tools past the configured limit.
    #[error("Too many consecutive tool calls ({limit}). Aborting.")]
    TooManyToolPasses { limit: usize },

    /// Provider or model-config failure (not retried at this layer).
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// The `on_before_request` hook failed.
    #[error("before-request hook failed: {reason}")]
    BeforeRequest { reason: String },

    /// A checkpoint no longer matches the session history.
    #[error("checkpoint is stale: session history was rewritten after it was taken")]
    StaleCheckpoint,

    /// The provider cache lock was poisoned.
    #[error("provider cache error: {reason}")]
    ProviderCache { reason: String },
}

impl AgentError {
    /// Whether this error is the abort condition.
    pub fn is_abort(&self) -> bool {
        matches!(self, AgentError::Aborted)
    }
}

/// Outcome of a failed tool handler.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The handler observed the abort signal and gave up.
    #[error("aborted")]
    Aborted,

    /// Ordinary failure; recorded in the conversation, the round continues.
    #[error("{0}")]
    Failed(#[from] anyhow::Error),
}

impl ToolError {
    /// Shorthand for a failure with a plain message.
    pub fn msg(message: impl std::fmt::Display) -> Self {
        ToolError::Failed(anyhow::anyhow!("{message}"))
    }
}
