//! Result types returned by the workflow entry points.
//!
//! Everything here is `Serialize` so the CLI's `--json` mode can print a
//! complete run without a separate view model.

use crate::analysis::CareerAnalysis;
use crate::backend::{CareerPathRecord, PredictionRecord, SkillRecord};
use crate::error::StepError;
use crate::pipeline::input::DocumentKind;
use crate::pipeline::llm::ModelAnswer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of [`crate::workflow::analyze`]: the model's answer at each level
/// of interpretation.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutput {
    /// File name or URL of the résumé.
    pub document: String,
    pub kind: DocumentKind,
    /// Raw answer plus token accounting.
    pub model: ModelAnswer,
    /// The JSON value recovered from the raw answer.
    pub extracted: Value,
    /// `extracted`, validated against the analysis schema.
    pub analysis: CareerAnalysis,
}

/// Outcome of one skill: created, optionally read back, or failed.
#[derive(Debug, Clone, Serialize)]
pub struct SkillOutcome {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<SkillRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored: Option<SkillRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
}

/// Outcome of a single-shot backend step.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome<T> {
    /// The step was not attempted.
    Skipped { reason: String },
    /// The record was created. `stored` is the read-back copy, absent when
    /// the read-back failed (see `error`).
    Saved {
        created: T,
        stored: Option<T>,
        error: Option<StepError>,
    },
    /// Creation failed.
    Failed { error: StepError },
}

impl<T> StepOutcome<T> {
    pub fn skipped(reason: impl Into<String>) -> Self {
        StepOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StepOutcome::Skipped { .. })
    }

    /// The created record, if creation succeeded.
    pub fn created(&self) -> Option<&T> {
        match self {
            StepOutcome::Saved { created, .. } => Some(created),
            _ => None,
        }
    }
}

/// Aggregate statistics for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStats {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub model_duration_ms: u64,
    pub backend_duration_ms: u64,
    pub total_duration_ms: u64,
    /// Backend calls (creates and read-backs) that succeeded.
    pub succeeded_steps: usize,
    /// Backend calls that failed.
    pub failed_steps: usize,
}

/// Result of [`crate::workflow::run`].
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutput {
    #[serde(flatten)]
    pub analysis: AnalysisOutput,
    /// Base address the backend was found at.
    pub backend_url: String,
    pub skills: Vec<SkillOutcome>,
    pub career: StepOutcome<CareerPathRecord>,
    pub prediction: StepOutcome<PredictionRecord>,
    pub stats: WorkflowStats,
}

impl WorkflowOutput {
    /// Every non-fatal failure recorded during the run, in order.
    pub fn errors(&self) -> Vec<&StepError> {
        let skill_errors = self.skills.iter().filter_map(|s| s.error.as_ref());
        let career_errors = step_error(&self.career);
        let prediction_errors = step_error(&self.prediction);
        skill_errors
            .chain(career_errors)
            .chain(prediction_errors)
            .collect()
    }
}

fn step_error<T>(outcome: &StepOutcome<T>) -> Option<&StepError> {
    match outcome {
        StepOutcome::Saved { error, .. } => error.as_ref(),
        StepOutcome::Failed { error } => Some(error),
        StepOutcome::Skipped { .. } => None,
    }
}
