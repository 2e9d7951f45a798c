//! Recording helpers for evaluation metrics.
//!
//! Every function is a no-op until [`init_metrics`](super::init_metrics)
//! has run, so library users that never enable metrics pay nothing.

use super::prometheus::get_metrics;
use crate::execution::transcript::Transcript;

/// Task outcome label for a task that reached a passing candidate.
pub const OUTCOME_PASSED: &str = "passed";
/// Task outcome label for a task that used up its repair steps.
pub const OUTCOME_EXHAUSTED: &str = "exhausted";

/// Record a finished sandbox run.
pub fn record_sandbox_run(transcript: &Transcript) {
    let verdict = transcript.verdict();

    if let Some(m) = get_metrics() {
        m.sandbox_runs_total
            .with_label_values(&[verdict.as_str()])
            .inc();
        m.sandbox_duration
            .with_label_values(&[verdict.as_str()])
            .observe(transcript.duration_ms as f64 / 1000.0);
    }
}

/// Record a judged (or skipped) repair step.
///
/// `verdict` is a verdict label or `"empty_body"` for a step whose
/// candidate was empty.
pub fn record_step(verdict: &str) {
    if let Some(m) = get_metrics() {
        m.steps_total.with_label_values(&[verdict]).inc();
    }
}

/// Record the final outcome of a task.
pub fn record_task(passed: bool) {
    let outcome = if passed {
        OUTCOME_PASSED
    } else {
        OUTCOME_EXHAUSTED
    };

    if let Some(m) = get_metrics() {
        m.tasks_total.with_label_values(&[outcome]).inc();
    }

    tracing::trace!(outcome, "Recorded task metric");
}

/// Record a model request.
pub fn record_llm_request(model: &str, success: bool, latency_secs: f64) {
    let status = if success { "success" } else { "failure" };

    if let Some(m) = get_metrics() {
        m.llm_requests_total
            .with_label_values(&[model, status])
            .inc();
        m.llm_latency.with_label_values(&[model]).observe(latency_secs);
    }

    tracing::trace!(model, status, latency_secs, "Recorded LLM request metric");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{export_metrics, init_metrics};

    #[test]
    fn test_recording_shows_up_in_export() {
        let _ = init_metrics();

        record_task(true);
        record_step("pass");
        record_llm_request("test-model", true, 0.7);
        record_sandbox_run(&Transcript::completed("OK\n", "", 0, 120));

        let text = export_metrics();
        assert!(text.contains("fix_forge_tasks_total"));
        assert!(text.contains("outcome=\"passed\""));
        assert!(text.contains("fix_forge_repair_steps_total"));
        assert!(text.contains("fix_forge_llm_requests_total"));
        assert!(text.contains("model=\"test-model\""));
        assert!(text.contains("fix_forge_sandbox_runs_total"));
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(OUTCOME_PASSED, "passed");
        assert_eq!(OUTCOME_EXHAUSTED, "exhausted");
    }
}
