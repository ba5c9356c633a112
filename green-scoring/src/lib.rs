//! Fault-detection scoring (C2) and composite-score aggregation (C4).
//!
//! Formulas follow `calculate_fault_detection_score`/
//! `calculate_composite_score` directly; the score-averaging shape
//! echoes `testing_framework::TestSuite::run_full_suite`.

use std::collections::HashMap;

use green_core::{CompositeScore, EvalDetail, EvalResult, ResultEnvelope, TaskDetail, TaskRewards, Track, TestExecutionResult};

/// `1.0` iff tests passed the correct implementation and failed the
/// buggy one; `0.0` in every other case, including either result being
/// absent (a task whose pipeline failed before scoring).
pub fn fault_detection_score(
    correct_result: Option<&TestExecutionResult>,
    buggy_result: Option<&TestExecutionResult>,
) -> f64 {
    match (correct_result, buggy_result) {
        (Some(correct), Some(buggy)) if correct.passed && !buggy.passed => 1.0,
        _ => 0.0,
    }
}

/// Arithmetic mean of per-task fault-detection scores; `0.0` on empty
/// input (never NaN from a 0/0 division).
pub fn aggregate_fault_detection_scores(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `score = round(0.6 * mutation_score + 0.4 * fault_detection_rate, 2)`.
pub fn calculate_composite_score(mutation_score: f64, fault_detection_rate: f64) -> CompositeScore {
    let score = round2(0.6 * mutation_score + 0.4 * fault_detection_rate);
    CompositeScore {
        mutation_score,
        fault_detection_rate,
        score,
    }
}

/// Package a run's task details and aggregate scores into the result
/// artifact's participant-facing schema. `trace_id`/`latency` are not
/// set here — the executor stamps them in afterward, since they are
/// request-scoped rather than score-scoped.
pub fn generate_result(
    participant_id: &str,
    task_details: Vec<TaskDetail>,
    composite: CompositeScore,
    pass_rate: f64,
    track: Track,
) -> ResultEnvelope {
    let task_count = task_details.len();
    let mut participants = HashMap::new();
    participants.insert("agent".to_string(), participant_id.to_string());

    ResultEnvelope {
        participants,
        results: vec![EvalResult {
            score: composite.score,
            pass_rate,
            task_rewards: TaskRewards {
                mutation_score: composite.mutation_score,
                fault_detection_rate: composite.fault_detection_rate,
                track,
                task_count,
            },
            detail: EvalDetail { task_details },
        }],
        trace_id: String::new(),
        latency: 0.0,
    }
}
