//! Progress-callback trait for workflow events.
//!
//! Inject an [`Arc<dyn WorkflowProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to receive
//! events as the workflow reads the résumé, queries the model and talks to
//! the backend. The CLI uses it to show every backend response as it
//! arrives; a web front-end could forward the same events over a socket.
//!
//! # Example
//!
//! ```rust
//! use edgequake_cv2career::{AnalysisConfig, WorkflowProgressCallback, WorkflowStep};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl WorkflowProgressCallback for Printer {
//!     fn on_step_complete(&self, step: &WorkflowStep, detail: &str) {
//!         eprintln!("{step}: {detail}");
//!     }
//! }
//!
//! let config = AnalysisConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Coarse phase of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    ReadingDocument,
    QueryingModel,
    LocatingBackend,
    SavingSkills,
    SavingCareer,
    GeneratingPrediction,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::ReadingDocument => "Reading résumé",
            Stage::QueryingModel => "Analysing with the model",
            Stage::LocatingBackend => "Locating backend",
            Stage::SavingSkills => "Saving skills",
            Stage::SavingCareer => "Saving career path",
            Stage::GeneratingPrediction => "Generating prediction",
        };
        f.write_str(s)
    }
}

/// One backend step, named by what it acts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowStep {
    Skill(String),
    Career(String),
    Prediction { career_path_id: i64 },
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowStep::Skill(name) => write!(f, "skill '{name}'"),
            WorkflowStep::Career(title) => write!(f, "career '{title}'"),
            WorkflowStep::Prediction { career_path_id } => {
                write!(f, "prediction for career path {career_path_id}")
            }
        }
    }
}

/// Called by the workflow as it progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync` so a config
/// holding one can cross `tokio::spawn` boundaries.
pub trait WorkflowProgressCallback: Send + Sync {
    /// Called when the workflow enters a new stage.
    fn on_stage(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called with the model's raw answer, before any extraction.
    fn on_raw_output(&self, raw: &str) {
        let _ = raw;
    }

    /// Called when a backend step succeeds.
    ///
    /// `detail` is a short human-readable summary (usually the new ID).
    fn on_step_complete(&self, step: &WorkflowStep, detail: &str) {
        let _ = (step, detail);
    }

    /// Called when a backend step fails. The workflow continues.
    fn on_step_error(&self, step: &WorkflowStep, error: &str) {
        let _ = (step, error);
    }

    /// Called once after every step has been attempted.
    ///
    /// # Arguments
    /// * `succeeded` — backend steps that completed
    /// * `failed`    — backend steps that failed
    fn on_workflow_complete(&self, succeeded: usize, failed: usize) {
        let _ = (succeeded, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl WorkflowProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn WorkflowProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        stages: Mutex<Vec<Stage>>,
        completes: AtomicUsize,
        errors: AtomicUsize,
        finished: Mutex<Option<(usize, usize)>>,
    }

    impl WorkflowProgressCallback for TrackingCallback {
        fn on_stage(&self, stage: Stage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_step_complete(&self, _step: &WorkflowStep, _detail: &str) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_step_error(&self, _step: &WorkflowStep, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_workflow_complete(&self, succeeded: usize, failed: usize) {
            *self.finished.lock().unwrap() = Some((succeeded, failed));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage(Stage::ReadingDocument);
        cb.on_raw_output("{}");
        cb.on_step_complete(&WorkflowStep::Skill("SQL".into()), "ID=1");
        cb.on_step_error(&WorkflowStep::Career("Nurse".into()), "HTTP 500");
        cb.on_workflow_complete(1, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_stage(Stage::SavingSkills);
        tracker.on_step_complete(&WorkflowStep::Skill("Python".into()), "ID=1");
        tracker.on_step_error(&WorkflowStep::Skill("SQL".into()), "HTTP 500");
        tracker.on_workflow_complete(1, 1);

        assert_eq!(*tracker.stages.lock().unwrap(), vec![Stage::SavingSkills]);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(*tracker.finished.lock().unwrap(), Some((1, 1)));
    }

    #[test]
    fn step_display() {
        assert_eq!(WorkflowStep::Skill("SQL".into()).to_string(), "skill 'SQL'");
        assert_eq!(
            WorkflowStep::Prediction { career_path_id: 3 }.to_string(),
            "prediction for career path 3"
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_stage(Stage::QueryingModel);
    }
}
