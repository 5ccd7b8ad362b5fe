use std::io::Write;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::Metrics;

/// Wire-shaped score vector handed to the remote scorer. Field names are
/// the service contract and must not drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsPayload {
    pub child_id: String,
    pub avg_reaction_time: f64,
    pub reaction_time_std: f64,
    pub accuracy_rate: f64,
    pub impulsivity_error_rate: f64,
    pub focus_consistency_score: f64,
    pub task_completion_ratio: f64,
}

impl MetricsPayload {
    pub fn new(subject_id: impl Into<String>, metrics: &Metrics) -> Self {
        Self {
            child_id: subject_id.into(),
            avg_reaction_time: metrics.mean_latency_ms,
            reaction_time_std: metrics.latency_std_dev_ms,
            accuracy_rate: metrics.accuracy_rate,
            impulsivity_error_rate: metrics.impulsivity_error_rate,
            focus_consistency_score: metrics.focus_consistency_score,
            task_completion_ratio: metrics.task_completion_ratio,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveResult {
    #[serde(rename = "type")]
    pub kind: String,
    pub score: f64,
}

/// What the scorer sends back; the client only displays `score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub status: String,
    pub objective_result: ObjectiveResult,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("failed to run submit command: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("submit command exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },

    #[error("malformed JSON crossing the submission boundary: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Outbound boundary of the engine. One call per completed session; no
/// retry or caching here. A failure leaves the payload with the caller so
/// the same session can be resubmitted without rerunning trials.
pub trait Submitter {
    fn submit(&self, payload: &MetricsPayload) -> Result<ScoreReport, SubmitError>;
}

/// Pipes the payload as JSON into a user-configured command and parses a
/// score report from its stdout. The command is the external collaborator;
/// whatever protocol it speaks to the scorer is its business.
#[derive(Debug, Clone)]
pub struct CommandSubmitter {
    command: String,
}

impl CommandSubmitter {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Submitter for CommandSubmitter {
    fn submit(&self, payload: &MetricsPayload) -> Result<ScoreReport, SubmitError> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let body = serde_json::to_vec(payload)?;
        if let Some(stdin) = child.stdin.as_mut() {
            // the collaborator may exit without reading; its exit status is
            // what gets judged below
            let _ = stdin.write_all(&body);
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(SubmitError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}
