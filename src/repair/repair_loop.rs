//! Per-task repair state machine.
//!
//! ```text
//! BASELINE → ATTEMPTING(1) → ATTEMPTING(2) → … → ATTEMPTING(N) → EXHAUSTED
//!                 │                │                   │
//!                 └──── PASS ──────┴────── PASS ───────┴──→ SUCCESS
//! ```
//!
//! Each step's transcript is the only feedback passed to the next step.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::execution::{SandboxExecutor, Transcript, Verdict};
use crate::extraction::{strip_meta, CandidateExtractor};
use crate::metrics;
use crate::task::TaskItem;
use crate::utils::{truncate, DEFAULT_TRUNCATE_CHARS};

use super::agent::RepairAgent;
use super::error::{RepairError, RepairResult};
use super::result::{AttemptResult, RunResults};

/// Default step budget per task.
pub const DEFAULT_MAX_STEPS: u32 = 3;

/// Step label recorded when a candidate was empty.
const EMPTY_BODY_LABEL: &str = "empty_body";

/// Configuration for the repair loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairConfig {
    /// Maximum repair steps per task. Must be at least 1.
    pub max_steps: u32,
    /// Per-execution wall-clock timeout; the sandbox default when `None`.
    pub timeout_seconds: Option<u64>,
    /// Print truncated baseline and failing transcripts.
    pub debug: bool,
    /// Print each truncated candidate.
    pub show_code: bool,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            timeout_seconds: None,
            debug: false,
            show_code: false,
        }
    }
}

impl RepairConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_show_code(mut self, show_code: bool) -> Self {
        self.show_code = show_code;
        self
    }

    /// Checks the configuration before any task runs.
    pub fn validate(&self) -> RepairResult<()> {
        if self.max_steps == 0 {
            return Err(RepairError::InvalidConfig(
                "max_steps must be at least 1".to_string(),
            ));
        }
        if self.timeout_seconds == Some(0) {
            return Err(RepairError::InvalidConfig(
                "timeout must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }
}

/// States of one task's repair sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairState {
    /// Running the unmodified buggy program.
    Baseline,
    /// Requesting and judging the candidate for `step`.
    Attempting { step: u32 },
    /// A candidate passed at `step`.
    Success { step: u32 },
    /// The step budget ran out.
    Exhausted,
}

impl RepairState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RepairState::Success { .. } | RepairState::Exhausted)
    }
}

impl fmt::Display for RepairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepairState::Baseline => f.write_str("BASELINE"),
            RepairState::Attempting { step } => write!(f, "ATTEMPTING({step})"),
            RepairState::Success { step } => write!(f, "SUCCESS({step})"),
            RepairState::Exhausted => f.write_str("EXHAUSTED"),
        }
    }
}

/// Outcome of a single attempt step.
enum StepOutcome {
    Pass { body: String },
    Fail { log: String },
}

/// Drives tasks through baseline execution and repair attempts.
pub struct RepairLoop {
    agent: RepairAgent,
    sandbox: Arc<dyn SandboxExecutor>,
    extractor: CandidateExtractor,
    config: RepairConfig,
}

impl fmt::Debug for RepairLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepairLoop")
            .field("agent", &self.agent)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RepairLoop {
    /// Creates a loop.
    ///
    /// # Errors
    ///
    /// Returns `RepairError::InvalidConfig` for a zero step budget or timeout.
    pub fn new(
        agent: RepairAgent,
        sandbox: Arc<dyn SandboxExecutor>,
        config: RepairConfig,
    ) -> RepairResult<Self> {
        config.validate()?;
        Ok(Self {
            agent,
            sandbox,
            extractor: CandidateExtractor::default(),
            config,
        })
    }

    /// Replaces the candidate extractor.
    pub fn with_extractor(mut self, extractor: CandidateExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &RepairConfig {
        &self.config
    }

    fn timeout(&self) -> u64 {
        self.config
            .timeout_seconds
            .unwrap_or_else(|| self.sandbox.default_timeout())
    }

    /// Runs every task in input order.
    ///
    /// A task that exhausts its budget is recorded and the run continues.
    /// Sandbox and model infrastructure failures abort the run.
    pub async fn run_all(&self, tasks: &[TaskItem]) -> RepairResult<RunResults> {
        let mut results = RunResults::new();
        for task in tasks {
            results.push(self.run_task(task).await?);
        }
        Ok(results)
    }

    /// Runs the state machine for one task.
    pub async fn run_task(&self, task: &TaskItem) -> RepairResult<AttemptResult> {
        println!("\n=== {} ===", task.task_id);

        let mut state = RepairState::Baseline;
        debug!(task_id = %task.task_id, state = %state, "Repair state");

        let baseline_program = task.baseline_program();
        let baseline = self
            .sandbox
            .execute(&baseline_program, &task.test, self.timeout())
            .await?;
        debug!(
            task_id = %task.task_id,
            verdict = %baseline.verdict(),
            "Baseline executed"
        );
        if self.config.debug {
            println!("[baseline log]{}", truncate(&baseline.text, DEFAULT_TRUNCATE_CHARS));
        }

        // A passing baseline still goes through repair; there is no shortcut.
        let mut last_log = baseline.text;

        for step in 1..=self.config.max_steps {
            state = RepairState::Attempting { step };
            debug!(task_id = %task.task_id, state = %state, "Repair state");

            match self
                .attempt(task, step, &baseline_program, &last_log)
                .await?
            {
                StepOutcome::Pass { body } => {
                    state = RepairState::Success { step };
                    info!(task_id = %task.task_id, state = %state, "Task repaired");
                    metrics::record_task(true);
                    return Ok(AttemptResult::passed(&task.task_id, step, body));
                }
                StepOutcome::Fail { log } => last_log = log,
            }
        }

        state = RepairState::Exhausted;
        info!(
            task_id = %task.task_id,
            state = %state,
            max_steps = self.config.max_steps,
            "Step budget exhausted"
        );
        metrics::record_task(false);
        Ok(AttemptResult::exhausted(
            &task.task_id,
            self.config.max_steps,
            last_log,
        ))
    }

    async fn attempt(
        &self,
        task: &TaskItem,
        step: u32,
        baseline_program: &str,
        last_log: &str,
    ) -> RepairResult<StepOutcome> {
        let response = self
            .agent
            .propose(step, &task.prompt, baseline_program, last_log)
            .await?;

        let candidate = self.extractor.extract(&strip_meta(&response));
        debug!(
            task_id = %task.task_id,
            step,
            strategy = %candidate.strategy,
            full_module = candidate.is_full_module,
            "Candidate extracted"
        );
        if self.config.show_code {
            println!(
                "[candidate body]\n{}",
                truncate(&candidate.code, DEFAULT_TRUNCATE_CHARS)
            );
        }

        if candidate.is_empty() {
            if self.config.debug {
                println!("[warn] model returned empty/ non-code body; skipping this step");
            }
            metrics::record_step(EMPTY_BODY_LABEL);
            return Ok(StepOutcome::Fail {
                log: Transcript::empty_body().text,
            });
        }

        let program = task.assemble(&candidate.code);
        let transcript = self
            .sandbox
            .execute(&program, &task.test, self.timeout())
            .await?;
        let verdict = transcript.verdict();
        metrics::record_step(verdict.as_str());

        let ok = verdict == Verdict::Pass;
        println!("step {}: {}", step, if ok { "PASS" } else { "fail" });
        debug!(task_id = %task.task_id, step, verdict = %verdict, "Candidate judged");

        if ok {
            return Ok(StepOutcome::Pass {
                body: candidate.code,
            });
        }
        if self.config.debug {
            println!("[step log]{}", truncate(&transcript.text, DEFAULT_TRUNCATE_CHARS));
        }
        Ok(StepOutcome::Fail {
            log: transcript.text,
        })
    }
}
