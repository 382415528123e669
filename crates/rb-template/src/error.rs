//! Expression errors

use thiserror::Error;

pub type TemplateResult<T> = Result<T, TemplateError>;

/// Failure to compile or evaluate an expression
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The expression does not parse
    #[error("invalid expression syntax: {message}")]
    Syntax { message: String },

    /// The expression refers to a variable the context lacks
    #[error("undefined variable: {message}")]
    Undefined { message: String },

    #[error("evaluation failed: {message}")]
    Evaluation { message: String },

    /// The value has no JSON representation
    #[error("not representable as JSON: {message}")]
    NotJson { message: String },

    #[error("unknown expression engine '{name}'")]
    UnknownEngine { name: String },
}

impl From<minijinja::Error> for TemplateError {
    fn from(err: minijinja::Error) -> Self {
        let message = err.to_string();
        match err.kind() {
            minijinja::ErrorKind::SyntaxError => Self::Syntax { message },
            minijinja::ErrorKind::UndefinedError => Self::Undefined { message },
            _ => Self::Evaluation { message },
        }
    }
}

impl From<serde_json::Error> for TemplateError {
    fn from(err: serde_json::Error) -> Self {
        Self::NotJson {
            message: err.to_string(),
        }
    }
}
