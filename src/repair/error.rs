//! Error types for the repair loop.

use thiserror::Error;

use crate::error::{LlmError, SandboxError};

/// Run-fatal failures of the repair loop.
///
/// A task that exhausts its step budget is a recorded outcome, not an
/// error. Only infrastructure failures end up here.
#[derive(Debug, Error)]
pub enum RepairError {
    /// The sandbox could not run a program.
    #[error("Sandbox failure: {0}")]
    Sandbox(#[from] SandboxError),

    /// The model capability failed after retries.
    #[error("Model failure: {0}")]
    Llm(#[from] LlmError),

    /// Invalid loop configuration.
    #[error("Invalid repair configuration: {0}")]
    InvalidConfig(String),
}

/// Result alias for repair operations.
pub type RepairResult<T> = Result<T, RepairError>;
