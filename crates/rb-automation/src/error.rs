//! Error types for automation evaluation

use rb_core::EventError;
use rb_template::TemplateError;
use std::fmt;
use thiserror::Error;

/// Result type for evaluation
pub type EvalResult<T> = Result<T, AutomationError>;

/// How far an abort signal reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortScope {
    /// Drop the rest of the current frame, the parent continues
    Sequence,
    /// Drop the rest of the run, the result is still computed
    Run,
}

impl fmt::Display for AbortScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortScope::Sequence => write!(f, "sequence"),
            AbortScope::Run => write!(f, "run"),
        }
    }
}

/// Automation errors
#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid parameters for block '{block}': {message}")]
    Conversion { block: String, message: String },

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Block '{block}' failed: {message}")]
    Block { block: String, message: String },

    #[error("Unknown {kind} block type: {type_tag}")]
    UnknownBlockType {
        kind: &'static str,
        type_tag: String,
    },

    #[error("Execution aborted ({0})")]
    Aborted(AbortScope),

    #[error("Pending resume not found: {0}")]
    PendingNotFound(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AutomationError {
    /// Failure raised by a block implementation
    pub fn block(block: impl Into<String>, message: impl Into<String>) -> Self {
        AutomationError::Block {
            block: block.into(),
            message: message.into(),
        }
    }

    /// Signal that drops the rest of the current frame
    pub fn stop_sequence() -> Self {
        AutomationError::Aborted(AbortScope::Sequence)
    }

    /// Signal that drops the rest of the run
    pub fn stop_run() -> Self {
        AutomationError::Aborted(AbortScope::Run)
    }

    /// Check whether this is an abort signal of the given scope
    pub fn is_abort(&self, scope: AbortScope) -> bool {
        matches!(self, AutomationError::Aborted(s) if *s == scope)
    }
}

impl From<EventError> for AutomationError {
    fn from(err: EventError) -> Self {
        AutomationError::InvalidInput(err.to_string())
    }
}
