//! fix-forge: iterative LLM bug-repair evaluation.
//!
//! Asks a language model to repair buggy Python functions, runs each
//! candidate against held-out tests inside an isolated Docker container,
//! and records whether and when a repair passed.

pub mod assembler;
pub mod cli;
pub mod error;
pub mod execution;
pub mod extraction;
pub mod llm;
pub mod metrics;
pub mod repair;
pub mod task;
pub mod utils;

pub use error::{LlmError, LoadError, SandboxError};
pub use repair::{RepairError, RunResults, RunSummary};
