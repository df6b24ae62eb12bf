//! FILENAME: core/parser/src/error.rs

use thiserror::Error;

use crate::parser::ParseError;

/// Coarse outcome of an evaluation, for callers that only branch on
/// "did it work, and if not, was it the text or the data".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalStatus {
    Success,
    ParseError,
    RuntimeError,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Division by zero")]
    DivideByZero,

    #[error("Invalid argument to {function}: {reason}")]
    InvalidArgument { function: String, reason: String },

    #[error("Result is not a finite number")]
    NotFinite,
}

impl EvalError {
    pub fn status(&self) -> EvalStatus {
        match self {
            EvalError::Parse(_) => EvalStatus::ParseError,
            _ => EvalStatus::RuntimeError,
        }
    }

    pub(crate) fn invalid_argument(function: &str, reason: impl Into<String>) -> Self {
        EvalError::InvalidArgument {
            function: function.to_string(),
            reason: reason.into(),
        }
    }
}

impl EvalStatus {
    pub fn of<T>(result: &Result<T, EvalError>) -> Self {
        match result {
            Ok(_) => EvalStatus::Success,
            Err(e) => e.status(),
        }
    }
}
