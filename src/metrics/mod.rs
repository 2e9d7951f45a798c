//! Prometheus metrics for evaluation runs.
//!
//! Counts tasks by outcome, repair steps and sandbox runs by verdict, and
//! model requests by status, with latency histograms for the sandbox and
//! the model. Recording is a no-op until [`init_metrics`] is called.
//!
//! # Example
//!
//! ```ignore
//! use fix_forge::metrics::{export_metrics, init_metrics, record_task};
//!
//! init_metrics().expect("Failed to initialize metrics");
//! record_task(true);
//! let text = export_metrics();
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::{
    record_llm_request, record_sandbox_run, record_step, record_task, OUTCOME_EXHAUSTED,
    OUTCOME_PASSED,
};
pub use prometheus::{export_metrics, get_metrics, init_metrics, Metrics};
