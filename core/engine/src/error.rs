//! FILENAME: core/engine/src/error.rs

use thiserror::Error;

/// Errors from the fallible edges of the engine API. Recalculation itself
/// never fails: bad formulas and cycles degrade to stale or zero values.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    #[error("Invalid engine configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
