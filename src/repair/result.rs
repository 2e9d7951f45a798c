//! Per-task outcomes, the results artifact and the run summary.

use std::fs;
use std::path::Path;

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

/// Outcome of one task's repair sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptResult {
    /// Task identifier.
    pub task_id: String,
    /// Whether a candidate passed.
    pub pass: bool,
    /// Step of first success, or the step budget on exhaustion.
    pub steps: u32,
    /// Passing candidate body.
    pub body: Option<String>,
    /// Last transcript when no candidate passed.
    pub last_log: Option<String>,
}

impl AttemptResult {
    /// A task solved at `step` by `body`.
    pub fn passed(task_id: impl Into<String>, step: u32, body: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            pass: true,
            steps: step,
            body: Some(body.into()),
            last_log: None,
        }
    }

    /// A task that used all `max_steps` without passing.
    pub fn exhausted(task_id: impl Into<String>, max_steps: u32, last_log: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            pass: false,
            steps: max_steps,
            body: None,
            last_log: Some(last_log.into()),
        }
    }

    /// True when the task passed on the first repair step.
    pub fn passed_first_try(&self) -> bool {
        self.pass && self.steps == 1
    }
}

// The task id is the map key in the artifact, so only the outcome fields
// are written here.
impl Serialize for AttemptResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("AttemptResult", 3)?;
        state.serialize_field("pass", &self.pass)?;
        state.serialize_field("steps", &self.steps)?;
        if self.pass {
            state.serialize_field("body", self.body.as_deref().unwrap_or_default())?;
        } else {
            state.serialize_field("last_log", self.last_log.as_deref().unwrap_or_default())?;
        }
        state.end()
    }
}

/// All task outcomes of a run in input order.
///
/// Serializes as a JSON object keyed by task id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResults {
    results: Vec<AttemptResult>,
}

impl RunResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one task outcome.
    pub fn push(&mut self, result: AttemptResult) {
        self.results.push(result);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Looks up the outcome of `task_id`.
    pub fn get(&self, task_id: &str) -> Option<&AttemptResult> {
        self.results.iter().find(|r| r.task_id == task_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttemptResult> {
        self.results.iter()
    }

    /// Headline statistics for this run.
    pub fn summary(&self) -> RunSummary {
        RunSummary::from_results(self)
    }

    /// Writes the results artifact as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }
}

impl Serialize for RunResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.results.len()))?;
        for result in &self.results {
            map.serialize_entry(&result.task_id, result)?;
        }
        map.end()
    }
}

/// Run-level statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Number of tasks evaluated.
    pub num_tasks: usize,
    /// Tasks that passed on the first repair step.
    pub pass_at_1: usize,
    /// `pass_at_1` as a percentage, rounded to two decimals.
    pub pass_at_1_pct: f64,
    /// Tasks that passed at any step.
    pub num_passed: usize,
}

impl RunSummary {
    pub fn from_results(results: &RunResults) -> Self {
        let num_tasks = results.len();
        let pass_at_1 = results.iter().filter(|r| r.passed_first_try()).count();
        let num_passed = results.iter().filter(|r| r.pass).count();
        let pct = 100.0 * pass_at_1 as f64 / num_tasks.max(1) as f64;

        Self {
            num_tasks,
            pass_at_1,
            pass_at_1_pct: (pct * 100.0).round() / 100.0,
            num_passed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> RunResults {
        let mut results = RunResults::new();
        results.push(AttemptResult::passed("Python/2", 1, "return a + b"));
        results.push(AttemptResult::exhausted("Python/0", 3, "ASSERTION: "));
        results.push(AttemptResult::passed("Python/1", 2, "return x"));
        results
    }

    #[test]
    fn test_results_serialize_keyed_by_task_id_in_order() {
        let json = serde_json::to_string(&sample()).unwrap();
        let first = json.find("Python/2").unwrap();
        let second = json.find("Python/0").unwrap();
        let third = json.find("Python/1").unwrap();
        assert!(first < second && second < third);

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value["Python/2"],
            json!({"pass": true, "steps": 1, "body": "return a + b"})
        );
        assert_eq!(
            value["Python/0"],
            json!({"pass": false, "steps": 3, "last_log": "ASSERTION: "})
        );
    }

    #[test]
    fn test_summary_counts_first_step_passes_only() {
        let summary = sample().summary();
        assert_eq!(summary.num_tasks, 3);
        assert_eq!(summary.pass_at_1, 1);
        assert_eq!(summary.num_passed, 2);
        assert_eq!(summary.pass_at_1_pct, 33.33);
    }

    #[test]
    fn test_summary_of_empty_run() {
        let summary = RunResults::new().summary();
        assert_eq!(summary.num_tasks, 0);
        assert_eq!(summary.pass_at_1_pct, 0.0);
    }

    #[test]
    fn test_get_and_len() {
        let results = sample();
        assert_eq!(results.len(), 3);
        assert!(results.get("Python/0").is_some_and(|r| !r.pass));
        assert!(results.get("missing").is_none());
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent_results.json");
        sample().write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["Python/1"]["steps"], 2);
    }
}
