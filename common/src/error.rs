//! Error types for the inference engine.

use std::time::Duration;

use thiserror::Error;

/// Errors produced while answering an inference request.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The snapshot breaks a structural invariant (shape, counts, flag/reveal overlap).
    #[error("malformed board: {0}")]
    MalformedBoard(String),

    /// The revealed state admits no mine assignment at all.
    #[error("inconsistent board: {0}")]
    InconsistentBoard(String),

    /// A single oracle query ran past its budget. Recoverable per cell.
    #[error("oracle query exceeded its time budget after {elapsed:?}")]
    OracleTimeout { elapsed: Duration },

    #[error("oracle failure: {0}")]
    Oracle(String),

    #[error("classification cancelled after {completed} cells")]
    Cancelled { completed: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding error: {0}")]
    Snapshot(#[from] bcs::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
