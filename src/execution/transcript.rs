//! Execution transcripts and their classification.
//!
//! A transcript is the text a sandboxed run produced: stdout followed by
//! stderr, or a timeout header with whatever partial output was captured.
//! Completed runs are judged by scanning this text for markers; whether
//! the run hit the timeout is recorded separately, never read from output.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Marker printed by the runner when every test statement completed.
pub const OK_MARKER: &str = "OK";

/// Marker printed by the runner when a test assertion failed.
pub const ASSERTION_MARKER: &str = "ASSERTION:";

/// Marker printed by the runner when any other exception was raised.
pub const ERROR_MARKER: &str = "ERROR:";

/// Prefix of transcripts for runs that hit the wall-clock timeout.
pub const TIMEOUT_PREFIX: &str = "TIMEOUT (";

/// Transcript recorded when a model step yields no code.
pub const EMPTY_BODY: &str = "Empty body";

/// Classification of a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    AssertionFail,
    Error,
    Timeout,
}

impl Verdict {
    /// Classifies recorded transcript text, where the timeout header is
    /// the only trace of a timeout.
    pub fn classify(text: &str) -> Self {
        if text.starts_with(TIMEOUT_PREFIX) {
            return Verdict::Timeout;
        }
        Self::classify_output(text)
    }

    /// Classifies the output of a run that exited on its own.
    ///
    /// A pass needs the success marker and neither failure marker. Text
    /// with no markers at all (e.g. a killed interpreter) is an error.
    pub fn classify_output(text: &str) -> Self {
        let assertion = text.contains(ASSERTION_MARKER);
        let error = text.contains(ERROR_MARKER);
        if text.contains(OK_MARKER) && !assertion && !error {
            Verdict::Pass
        } else if assertion {
            Verdict::AssertionFail
        } else {
            Verdict::Error
        }
    }

    /// Stable lowercase label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::AssertionFail => "assertion_fail",
            Verdict::Error => "error",
            Verdict::Timeout => "timeout",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one sandboxed execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    /// Combined output text.
    pub text: String,
    /// Exit code of the runner, absent after a timeout.
    pub exit_code: Option<i64>,
    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: u64,
    /// True when the run was killed at the wall-clock timeout.
    #[serde(default)]
    pub timed_out: bool,
}

impl Transcript {
    /// Transcript of a run that exited on its own.
    pub fn completed(stdout: &str, stderr: &str, exit_code: i64, duration_ms: u64) -> Self {
        Self {
            text: format!("{stdout}{stderr}"),
            exit_code: Some(exit_code),
            duration_ms,
            timed_out: false,
        }
    }

    /// Transcript of a run killed at the wall-clock timeout.
    pub fn timed_out(timeout_seconds: u64, stdout: &str, stderr: &str, duration_ms: u64) -> Self {
        Self {
            text: format!("{TIMEOUT_PREFIX}{timeout_seconds}s)\nSTDOUT:\n{stdout}\nSTDERR:\n{stderr}"),
            exit_code: None,
            duration_ms,
            timed_out: true,
        }
    }

    /// Creates a transcript from plain text, e.g. a recorded or synthetic log.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            timed_out: text.starts_with(TIMEOUT_PREFIX),
            text,
            exit_code: None,
            duration_ms: 0,
        }
    }

    /// Synthetic transcript for a step whose candidate was empty.
    pub fn empty_body() -> Self {
        Self::from_text(EMPTY_BODY)
    }

    /// Classification of this transcript.
    pub fn verdict(&self) -> Verdict {
        if self.timed_out {
            Verdict::Timeout
        } else {
            Verdict::classify_output(&self.text)
        }
    }

    /// True when the run passed.
    pub fn passed(&self) -> bool {
        self.verdict() == Verdict::Pass
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
