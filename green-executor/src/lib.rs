//! Evaluation executor (C6): orchestrates C1–C5 for every task in a run
//! and emits exactly two events — an artifact, then a terminal status.
//!
//! Owning a bundle of collaborators and driving them from one loop
//! mirrors `service-orchestrator-rs`'s `Scheduler` shape.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use green_config::Settings;
use green_core::{CompositeScore, ResultEnvelope, TaskDetail, TraceContext};
use green_errors::ExecutorError;
use green_purple_client::PurpleAgentClient;
use uuid::Uuid;

/// Terminal outcome of one evaluation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalStatus {
    Completed,
    Failed,
}

/// The two events an execution run emits, in order.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    Artifact(ResultEnvelope),
    Status(TerminalStatus),
}

/// Cooperative cancellation flag shared between the caller and a
/// running execution. Checked once per task boundary; an in-flight
/// subprocess is never interrupted, only the *next* task is skipped.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sink the executor pushes `ExecutionEvent`s into. A `Vec` suffices for
/// tests; the HTTP surface (`green-web`) adapts this into its response
/// framing.
pub trait EventSink {
    fn push(&mut self, event: ExecutionEvent);
}

impl EventSink for Vec<ExecutionEvent> {
    fn push(&mut self, event: ExecutionEvent) {
        Vec::push(self, event);
    }
}

/// Bundles the settings and the one piece of cross-request mutable
/// state (the Purple client's connection cache) that every evaluation
/// request shares.
pub struct EvaluationExecutor {
    settings: Settings,
    purple_client: PurpleAgentClient,
}

impl EvaluationExecutor {
    pub fn new(settings: Settings, purple_client: PurpleAgentClient) -> Self {
        Self {
            settings,
            purple_client,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn task_dir(&self, task_id: &str) -> PathBuf {
        self.settings.task_directory().join(task_id)
    }

    /// Run one evaluation request to completion, pushing exactly two
    /// events into `sink`: an artifact, then a terminal status.
    ///
    /// `participant_raw` is the request body's user-supplied text,
    /// trimmed and defaulted to `"unknown"` here. `cancel` is checked
    /// before dispatching each task; a cancellation observed mid-run
    /// stops further dispatch and forces a `Failed` terminal status.
    /// `green_purple_client::PurpleAgentClient::close` runs on every
    /// exit path, cancellation and error included.
    pub async fn execute(
        &self,
        participant_raw: &str,
        cancel: &CancellationToken,
        sink: &mut dyn EventSink,
    ) -> TraceContext {
        let trace = TraceContext::new(Uuid::new_v4().to_string());
        tracing::info!(trace_id = %trace.request_id, "starting evaluation");

        let outcome = self.run_pipeline(participant_raw, cancel, &trace).await;
        self.purple_client.close().await;

        match outcome {
            Ok((envelope, was_cancelled)) => {
                sink.push(ExecutionEvent::Artifact(envelope));
                let status = if was_cancelled {
                    TerminalStatus::Failed
                } else {
                    TerminalStatus::Completed
                };
                sink.push(ExecutionEvent::Status(status));
            }
            Err(err) => {
                tracing::error!(trace_id = %trace.request_id, error = %err, "evaluation failed");
                sink.push(ExecutionEvent::Status(TerminalStatus::Failed));
            }
        }

        tracing::info!(
            trace_id = %trace.request_id,
            latency = trace.elapsed_secs(),
            "evaluation finished"
        );
        trace
    }

    /// Runs the per-task loop and builds the envelope. Returns whether
    /// cancellation was observed so the caller can force `Failed`.
    async fn run_pipeline(
        &self,
        participant_raw: &str,
        cancel: &CancellationToken,
        trace: &TraceContext,
    ) -> Result<(ResultEnvelope, bool), ExecutorError> {
        let participant_id = {
            let trimmed = participant_raw.trim();
            if trimmed.is_empty() {
                "unknown".to_string()
            } else {
                trimmed.to_string()
            }
        };

        let mut task_details = Vec::with_capacity(self.settings.task_count);
        let mut mutation_scores = Vec::with_capacity(self.settings.task_count);
        let mut fault_detection_scores = Vec::with_capacity(self.settings.task_count);
        let mut was_cancelled = false;

        for i in 0..self.settings.task_count {
            if cancel.is_cancelled() {
                was_cancelled = true;
                break;
            }

            let task_id = format!("task_{:03}", i + 1);
            let detail = self.run_one_task(&task_id).await;

            mutation_scores.push(detail.mutation_score);
            fault_detection_scores.push(detail.fault_detection_rate);
            task_details.push(detail);
        }

        let avg_mutation_score = if mutation_scores.is_empty() {
            0.0
        } else {
            mutation_scores.iter().sum::<f64>() / mutation_scores.len() as f64
        };
        let fault_detection_rate =
            green_scoring::aggregate_fault_detection_scores(&fault_detection_scores);
        let composite: CompositeScore =
            green_scoring::calculate_composite_score(avg_mutation_score, fault_detection_rate);

        let pass_rate = if task_details.is_empty() {
            0.0
        } else {
            task_details
                .iter()
                .filter(|d| d.passed_correct && d.failed_buggy)
                .count() as f64
                / task_details.len() as f64
        };

        let mut envelope = green_scoring::generate_result(
            &participant_id,
            task_details,
            composite,
            pass_rate,
            self.settings.track,
        );
        envelope.trace_id = trace.request_id.clone();
        envelope.latency = trace.elapsed_secs();

        construct_artifact(&envelope)?;

        Ok((envelope, was_cancelled))
    }

    /// Drive one task end to end, absorbing any failure into a
    /// zero-valued [`TaskDetail`] rather than propagating it — a
    /// per-task error never aborts the run.
    async fn run_one_task(&self, task_id: &str) -> TaskDetail {
        let task = match green_task::load_task(&self.task_dir(task_id), self.settings.track) {
            Ok(task) => task,
            Err(err) => {
                tracing::warn!(task_id, error = %err, "failed to load task");
                return TaskDetail::failed(task_id);
            }
        };

        let test_source = match self
            .purple_client
            .generate_tests(&task.spec, task.track)
            .await
        {
            Ok(source) => source,
            Err(err) => {
                tracing::warn!(task_id, error = %err, "purple agent request failed");
                return TaskDetail::failed(task_id);
            }
        };

        let correct_result =
            match green_sandbox::against_correct(&test_source, &task.correct_implementation, task.track)
                .await
            {
                Ok(result) => result,
                Err(err) => {
                    tracing::warn!(task_id, error = %err, "sandbox run against correct implementation failed");
                    return TaskDetail::failed(task_id);
                }
            };

        let buggy_result =
            match green_sandbox::against_buggy(&test_source, &task.buggy_implementation, task.track)
                .await
            {
                Ok(result) => result,
                Err(err) => {
                    tracing::warn!(task_id, error = %err, "sandbox run against buggy implementation failed");
                    return TaskDetail::failed(task_id);
                }
            };

        let fd_score = green_scoring::fault_detection_score(Some(&correct_result), Some(&buggy_result));

        let mutation_result =
            match green_mutation::run(&test_source, &task.correct_implementation, task.track).await {
                Ok(result) => result,
                Err(err) => {
                    tracing::warn!(task_id, error = %err, "mutation testing failed to run");
                    return TaskDetail::failed(task_id);
                }
            };

        let task_composite = green_scoring::calculate_composite_score(mutation_result.mutation_score, fd_score);

        TaskDetail {
            task_id: task_id.to_string(),
            mutation_score: mutation_result.mutation_score,
            fault_detection_rate: fd_score,
            composite_score: task_composite.score,
            passed_correct: correct_result.passed,
            failed_buggy: !buggy_result.passed,
        }
    }
}

/// Render the envelope to the on-wire JSON schema (C9) so a value that
/// cannot be represented there — a non-finite score, for instance —
/// fails the request here rather than reaching a caller that expects
/// `completed`. The serialized bytes are discarded; this call exists to
/// validate, not to produce output.
fn construct_artifact(envelope: &ResultEnvelope) -> Result<(), ExecutorError> {
    serde_json::to_vec(envelope)
        .map(|_| ())
        .map_err(ExecutorError::Artifact)
}
