//! Data model shared by every stage of the evaluation pipeline.
//!
//! These types cross process and JSON boundaries (task directories on
//! disk, the result artifact sent to callers) so most of them derive
//! `Serialize`/`Deserialize`, following the plain-struct style
//! `testing_framework::TestResult` uses for the same reason.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Evaluation track: which flavor of spec/tests a task uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    Tdd,
    Bdd,
}

impl Track {
    pub fn as_str(self) -> &'static str {
        match self {
            Track::Tdd => "tdd",
            Track::Bdd => "bdd",
        }
    }
}

impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Track {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tdd" => Ok(Track::Tdd),
            "bdd" => Ok(Track::Bdd),
            other => Err(format!("invalid track {other:?}, expected \"tdd\" or \"bdd\"")),
        }
    }
}

/// A single loaded evaluation task: its spec and the two reference
/// implementations tests are run against.
#[derive(Debug, Clone)]
pub struct Task {
    pub task_id: String,
    pub function_name: String,
    pub track: Track,
    pub spec: String,
    pub correct_implementation: String,
    pub buggy_implementation: String,
}

/// How a sandboxed test run concluded, classified from the subprocess
/// exit code alone — never from scanning stdout/stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    None,
    Assertion,
    Infrastructure,
    Timeout,
}

/// The outcome of running a test program against one implementation in
/// a sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestExecutionResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub execution_time: f64,
    pub passed: bool,
    pub failure_type: FailureType,
}

impl TestExecutionResult {
    /// Build a result from a raw exit code, keeping `passed`/`failure_type`
    /// in lockstep with it (`passed ⇔ exit_code == 0 ⇔ failure_type == None`).
    pub fn from_exit_code(exit_code: i32, stdout: String, stderr: String, execution_time: f64) -> Self {
        let (passed, failure_type) = match exit_code {
            0 => (true, FailureType::None),
            1 => (false, FailureType::Assertion),
            _ => (false, FailureType::Infrastructure),
        };
        Self {
            exit_code,
            stdout,
            stderr,
            execution_time,
            passed,
            failure_type,
        }
    }

    /// Build a timed-out result. `exit_code` is conventionally `-1` since
    /// the process never produced one.
    pub fn timed_out(timeout_secs: u64, execution_time: f64, mut stderr: String) -> Self {
        if !stderr.is_empty() && !stderr.ends_with('\n') {
            stderr.push('\n');
        }
        stderr.push_str(&format!(
            "ERROR: test execution exceeded {timeout_secs}s timeout"
        ));
        Self {
            exit_code: -1,
            stdout: String::new(),
            stderr,
            execution_time,
            passed: false,
            failure_type: FailureType::Timeout,
        }
    }
}

/// The outcome of a mutation-testing pass over one task's correct
/// implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationResult {
    pub killed: u32,
    pub survived: u32,
    pub total: u32,
    pub mutation_score: f64,
    pub error: Option<String>,
}

impl MutationResult {
    pub fn from_counts(killed: u32, total: u32) -> Self {
        let survived = total.saturating_sub(killed);
        let mutation_score = if total > 0 {
            killed as f64 / total as f64
        } else {
            0.0
        };
        let error = if total == 0 {
            Some("no mutants were generated".to_string())
        } else {
            None
        };
        Self {
            killed,
            survived,
            total,
            mutation_score,
            error,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            killed: 0,
            survived: 0,
            total: 0,
            mutation_score: 0.0,
            error: Some(reason.into()),
        }
    }
}

/// The three scores that make up a task's or run's composite quality
/// measure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompositeScore {
    pub mutation_score: f64,
    pub fault_detection_rate: f64,
    pub score: f64,
}

/// Per-task scoring detail included in the result artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDetail {
    pub task_id: String,
    pub mutation_score: f64,
    pub fault_detection_rate: f64,
    pub composite_score: f64,
    pub passed_correct: bool,
    pub failed_buggy: bool,
}

impl TaskDetail {
    /// A zeroed detail for a task whose evaluation failed before scoring
    /// could happen; the run continues rather than aborting.
    pub fn failed(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            mutation_score: 0.0,
            fault_detection_rate: 0.0,
            composite_score: 0.0,
            passed_correct: false,
            failed_buggy: false,
        }
    }
}

/// Run-level reward summary, echoing the settings that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRewards {
    pub mutation_score: f64,
    pub fault_detection_rate: f64,
    pub track: Track,
    pub task_count: usize,
}

/// The per-participant evaluation result: run-level score plus every
/// task's detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalResult {
    pub score: f64,
    pub pass_rate: f64,
    pub task_rewards: TaskRewards,
    pub detail: EvalDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalDetail {
    pub task_details: Vec<TaskDetail>,
}

/// The outermost result artifact. `trace_id` and `latency` sit at the
/// top level even though they are outside the participant-facing
/// `EvalResult` schema documented for callers — preserved deliberately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub participants: HashMap<String, String>,
    pub results: Vec<EvalResult>,
    pub trace_id: String,
    pub latency: f64,
}

/// Per-request tracing context, threaded from the HTTP middleware through
/// the executor to the emitted artifact.
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub request_id: String,
    pub started_at: std::time::Instant,
}

impl TraceContext {
    pub fn new(request_id: String) -> Self {
        Self {
            request_id,
            started_at: std::time::Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_round_trips_through_str() {
        assert_eq!("tdd".parse::<Track>().unwrap(), Track::Tdd);
        assert_eq!("bdd".parse::<Track>().unwrap(), Track::Bdd);
        assert!("other".parse::<Track>().is_err());
        assert_eq!(Track::Tdd.to_string(), "tdd");
    }

    #[test]
    fn exit_code_classification_matches_invariant() {
        let ok = TestExecutionResult::from_exit_code(0, String::new(), String::new(), 0.1);
        assert!(ok.passed);
        assert_eq!(ok.failure_type, FailureType::None);

        let failed = TestExecutionResult::from_exit_code(1, String::new(), String::new(), 0.1);
        assert!(!failed.passed);
        assert_eq!(failed.failure_type, FailureType::Assertion);

        let crashed = TestExecutionResult::from_exit_code(2, String::new(), String::new(), 0.1);
        assert!(!crashed.passed);
        assert_eq!(crashed.failure_type, FailureType::Infrastructure);
    }

    #[test]
    fn timeout_sets_timeout_failure_type_and_appends_message() {
        let result = TestExecutionResult::timed_out(30, 30.5, "partial output".to_string());
        assert!(!result.passed);
        assert_eq!(result.failure_type, FailureType::Timeout);
        assert!(result.stderr.contains("exceeded 30s timeout"));
        assert!(result.stderr.starts_with("partial output"));
    }

    #[test]
    fn mutation_result_never_divides_by_zero() {
        let empty = MutationResult::from_counts(0, 0);
        assert_eq!(empty.mutation_score, 0.0);
        assert!(empty.error.is_some());

        let some = MutationResult::from_counts(3, 4);
        assert_eq!(some.survived, 1);
        assert_eq!(some.mutation_score, 0.75);
        assert!(some.error.is_none());
    }
}
