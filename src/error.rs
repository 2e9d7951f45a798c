//! Error types for fix-forge operations.
//!
//! Defines error types for the subsystems whose failures are run-fatal:
//! - Task source loading
//! - Sandbox (Docker) provisioning and launch
//! - LLM API interactions
//!
//! Failing candidates are not errors. Assertion failures, raised
//! exceptions and timeouts inside the sandbox are reported as transcript
//! data and drive the repair loop instead.

use thiserror::Error;

/// Errors that can occur while loading the task source.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON on line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing required field '{field}' on line {line}")]
    MissingField { line: usize, field: &'static str },

    #[error("Invalid field '{field}' on line {line}: {reason}")]
    InvalidField {
        line: usize,
        field: &'static str,
        reason: String,
    },

    #[error("Task '{0}' appears more than once in the task source")]
    DuplicateTask(String),
}

/// Errors that can occur while provisioning or launching the sandbox.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Docker daemon not available: {0}")]
    DaemonUnavailable(String),

    #[error("Sandbox image '{image}' unavailable: {reason}")]
    ImageUnavailable { image: String, reason: String },

    #[error("Sandbox launch failed: {0}")]
    LaunchFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API base URL: LLM_API_BASE environment variable not set")]
    MissingApiBase,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("LLM response contained no choices")]
    EmptyResponse,
}
