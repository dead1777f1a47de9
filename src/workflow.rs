//! Workflow entry points.
//!
//! [`analyze`] stops after the model's answer has been interpreted and needs
//! no backend. [`run`] continues and records the analysis in the career
//! backend:
//!
//! ```text
//! analyze ──▶ locate backend ──▶ skills (create + read back, each)
//!                                  └─▶ career path (create + read back)
//!                                        └─▶ prediction (generate + read back)
//! ```
//!
//! Backend failures after the backend has been located never abort the
//! run. Each one is recorded as a [`StepError`] in the output and reported
//! to the progress callback, and the remaining steps still execute.

use crate::analysis::CareerAnalysis;
use crate::backend::{
    BackendClient, BackendLocator, CareerPathRecord, HealthProbeLocator, NewCareerPath, NewSkill,
    PredictionRecord, PredictionRequest,
};
use crate::config::{AnalysisConfig, DEFAULT_MODEL};
use crate::error::{Cv2CareerError, StepError};
use crate::output::{AnalysisOutput, SkillOutcome, StepOutcome, WorkflowOutput, WorkflowStats};
use crate::pipeline::input::ResumeDocument;
use crate::pipeline::{encode, extract, input, llm};
use crate::progress::{Stage, WorkflowStep};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Analyse a résumé file or URL.
///
/// # Errors
/// Every failure is fatal here: unreadable input, provider problems,
/// [`Cv2CareerError::Extraction`] when no JSON could be recovered (the raw
/// answer is available through [`Cv2CareerError::raw_model_output`]) and
/// [`Cv2CareerError::InvalidAnalysis`] when the JSON has the wrong shape.
pub async fn analyze(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, Cv2CareerError> {
    let input_str = input_str.as_ref();
    info!("Starting analysis: {}", input_str);
    notify_stage(config, Stage::ReadingDocument);
    let doc = input::resolve_input(input_str, config.download_timeout_secs).await?;
    analyze_document(doc, config).await
}

/// Analyse a résumé already in memory, e.g. an HTTP upload.
///
/// `name` is only used in messages and the output.
pub async fn analyze_bytes(
    name: impl Into<String>,
    bytes: Vec<u8>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, Cv2CareerError> {
    notify_stage(config, Stage::ReadingDocument);
    let doc = ResumeDocument::from_bytes(name, bytes)?;
    analyze_document(doc, config).await
}

/// Analyse a résumé and record the result in the first reachable backend
/// among `config.backend.candidates`.
pub async fn run(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<WorkflowOutput, Cv2CareerError> {
    let locator = HealthProbeLocator::from_config(&config.backend)?;
    run_with_locator(input_str, config, &locator).await
}

/// Like [`run`], with a caller-chosen way of finding the backend.
///
/// The backend is located after the analysis succeeds, so a run with no
/// backend available still costs one model call.
pub async fn run_with_locator(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
    locator: &dyn BackendLocator,
) -> Result<WorkflowOutput, Cv2CareerError> {
    let total_start = Instant::now();
    let analysis = analyze(input_str, config).await?;

    notify_stage(config, Stage::LocatingBackend);
    let base_url = locator.locate().await?;
    let client = BackendClient::new(&base_url, config.backend.timeout_secs)?;

    let saved = save_analysis(&analysis.analysis, &client, config).await;

    let stats = WorkflowStats {
        input_tokens: analysis.model.input_tokens,
        output_tokens: analysis.model.output_tokens,
        model_duration_ms: analysis.model.duration_ms,
        backend_duration_ms: saved.duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        succeeded_steps: saved.succeeded,
        failed_steps: saved.failed,
    };

    info!(
        "Workflow complete: {} backend calls succeeded, {} failed, {}ms total",
        stats.succeeded_steps, stats.failed_steps, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_workflow_complete(stats.succeeded_steps, stats.failed_steps);
    }

    Ok(WorkflowOutput {
        analysis,
        backend_url: base_url,
        skills: saved.skills,
        career: saved.career,
        prediction: saved.prediction,
        stats,
    })
}

/// What [`save_analysis`] produced.
#[derive(Debug)]
pub struct SavedAnalysis {
    pub skills: Vec<SkillOutcome>,
    pub career: StepOutcome<CareerPathRecord>,
    pub prediction: StepOutcome<PredictionRecord>,
    pub succeeded: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

/// Record an analysis through `client`: every skill, then the career path,
/// then a prediction for `config.user_id`.
///
/// Never fails as a whole. The career step is skipped when the analysis has
/// no career or no usable metadata; the prediction step is skipped when no career
/// path was created.
pub async fn save_analysis(
    analysis: &CareerAnalysis,
    client: &BackendClient,
    config: &AnalysisConfig,
) -> SavedAnalysis {
    let start = Instant::now();
    let mut tally = Tally::new(config);

    // ── Skills ───────────────────────────────────────────────────────────
    notify_stage(config, Stage::SavingSkills);
    let mut skills = Vec::with_capacity(analysis.skills.len());
    for name in &analysis.skills {
        skills.push(save_skill(name, client, config, &mut tally).await);
    }

    // ── Career path ──────────────────────────────────────────────────────
    let career = match (&analysis.career_meta, analysis.has_career()) {
        (Some(meta), true) => {
            notify_stage(config, Stage::SavingCareer);
            save_career(&NewCareerPath::recommended(&analysis.career, meta), client, &mut tally)
                .await
        }
        _ => match &analysis.career_meta_error {
            Some(e) => {
                warn!("career_meta was rejected ({}); skipping career path", e);
                StepOutcome::skipped(format!("career_meta rejected: {e}"))
            }
            None => {
                info!("No career with metadata in the analysis; skipping career path");
                StepOutcome::skipped("analysis has no career with metadata")
            }
        },
    };

    // ── Prediction ───────────────────────────────────────────────────────
    let prediction = match career.created() {
        Some(path) => {
            notify_stage(config, Stage::GeneratingPrediction);
            let request = PredictionRequest {
                user_id: config.user_id,
                career_path_id: path.id,
                prediction_type: config.backend.prediction_type,
            };
            save_prediction(&request, client, &mut tally).await
        }
        None => StepOutcome::skipped("no career path was created"),
    };

    SavedAnalysis {
        skills,
        career,
        prediction,
        succeeded: tally.succeeded,
        failed: tally.failed,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn analyze_document(
    doc: ResumeDocument,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, Cv2CareerError> {
    let provider = resolve_provider(config).await?;
    let attachment = encode::encode_document(&doc, config.max_image_pixels)?;

    notify_stage(config, Stage::QueryingModel);
    info!("Sending '{}' ({}) to the model", doc.name, doc.kind.mime_type());
    let answer = llm::analyze_document(&provider, attachment, config).await?;
    debug!("Raw model output:\n{}", answer.raw);
    if let Some(ref cb) = config.progress_callback {
        cb.on_raw_output(&answer.raw);
    }

    let extracted = extract::extract_json(&answer.raw)?;
    let analysis = CareerAnalysis::from_value(extracted.clone())?;
    info!(
        "Analysis: {} skills, career '{}'",
        analysis.skills.len(),
        analysis.career
    );

    Ok(AnalysisOutput {
        document: doc.name,
        kind: doc.kind,
        model: answer,
        extracted,
        analysis,
    })
}

/// Counts backend calls and forwards step events to the progress callback.
struct Tally<'a> {
    config: &'a AnalysisConfig,
    succeeded: usize,
    failed: usize,
}

impl<'a> Tally<'a> {
    fn new(config: &'a AnalysisConfig) -> Self {
        Self {
            config,
            succeeded: 0,
            failed: 0,
        }
    }

    fn ok(&mut self, step: &WorkflowStep, detail: &str) {
        self.succeeded += 1;
        info!("{}: {}", step, detail);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_step_complete(step, detail);
        }
    }

    fn err(&mut self, step: &WorkflowStep, error: &StepError) {
        self.failed += 1;
        warn!("{}", error);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_step_error(step, &error.to_string());
        }
    }
}

async fn save_skill(
    name: &str,
    client: &BackendClient,
    config: &AnalysisConfig,
    tally: &mut Tally<'_>,
) -> SkillOutcome {
    let step = WorkflowStep::Skill(name.to_string());
    let created = match client
        .create_skill(&NewSkill::extracted(name, &config.backend))
        .await
    {
        Ok(rec) => rec,
        Err(e) => {
            let error = StepError::SkillFailed {
                skill: name.to_string(),
                detail: e.to_string(),
            };
            tally.err(&step, &error);
            return SkillOutcome {
                name: name.to_string(),
                created: None,
                stored: None,
                error: Some(error),
            };
        }
    };
    tally.ok(&step, &format!("created with ID={}", created.id));

    let (stored, error) = match client.get_skill(created.id).await {
        Ok(rec) => {
            tally.ok(&step, &format!("read back ID={}", rec.id));
            (Some(rec), None)
        }
        Err(e) => {
            let error = read_back_failed("skill", created.id, e);
            tally.err(&step, &error);
            (None, Some(error))
        }
    };

    SkillOutcome {
        name: name.to_string(),
        created: Some(created),
        stored,
        error,
    }
}

async fn save_career(
    career: &NewCareerPath,
    client: &BackendClient,
    tally: &mut Tally<'_>,
) -> StepOutcome<CareerPathRecord> {
    let step = WorkflowStep::Career(career.title.clone());
    let created = match client.create_career_path(career).await {
        Ok(rec) => rec,
        Err(e) => {
            let error = StepError::CareerFailed {
                career: career.title.clone(),
                detail: e.to_string(),
            };
            tally.err(&step, &error);
            return StepOutcome::Failed { error };
        }
    };
    tally.ok(&step, &format!("created with ID={}", created.id));

    let (stored, error) = match client.get_career_path(created.id).await {
        Ok(rec) => {
            tally.ok(&step, &format!("read back ID={}", rec.id));
            (Some(rec), None)
        }
        Err(e) => {
            let error = read_back_failed("career path", created.id, e);
            tally.err(&step, &error);
            (None, Some(error))
        }
    };
    StepOutcome::Saved {
        created,
        stored,
        error,
    }
}

async fn save_prediction(
    request: &PredictionRequest,
    client: &BackendClient,
    tally: &mut Tally<'_>,
) -> StepOutcome<PredictionRecord> {
    let step = WorkflowStep::Prediction {
        career_path_id: request.career_path_id,
    };
    let created = match client.generate_prediction(request).await {
        Ok(rec) => rec,
        Err(e) => {
            let error = StepError::PredictionFailed {
                career_path_id: request.career_path_id,
                detail: e.to_string(),
            };
            tally.err(&step, &error);
            return StepOutcome::Failed { error };
        }
    };
    tally.ok(&step, &format!("generated with ID={}", created.id));

    let (stored, error) = match client.get_prediction(created.id).await {
        Ok(rec) => {
            let score = rec
                .compatibility_score
                .map(|s| format!("{s}"))
                .unwrap_or_else(|| "n/a".to_string());
            tally.ok(&step, &format!("read back ID={}, compatibility {}", rec.id, score));
            (Some(rec), None)
        }
        Err(e) => {
            let error = read_back_failed("prediction", created.id, e);
            tally.err(&step, &error);
            (None, Some(error))
        }
    };
    StepOutcome::Saved {
        created,
        stored,
        error,
    }
}

fn read_back_failed(resource: &str, id: i64, e: impl std::fmt::Display) -> StepError {
    StepError::ReadBackFailed {
        resource: resource.to_string(),
        id,
        detail: e.to_string(),
    }
}

fn notify_stage(config: &AnalysisConfig, stage: Stage) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage(stage);
    }
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, Cv2CareerError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Cv2CareerError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`). The factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    honoured only when both are set.
/// 4. **Gemini** when `GEMINI_API_KEY` is present, since the default model
///    is a Gemini one.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
async fn resolve_provider(config: &AnalysisConfig) -> Result<Arc<dyn LLMProvider>, Cv2CareerError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, config.model_or_default());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        if !key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("gemini", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Cv2CareerError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{CareerMeta, CareerType};
    use crate::progress::WorkflowProgressCallback;
    use mockito::Matcher;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl WorkflowProgressCallback for Recorder {
        fn on_stage(&self, stage: Stage) {
            self.events.lock().unwrap().push(format!("stage {stage}"));
        }
        fn on_step_complete(&self, step: &WorkflowStep, detail: &str) {
            self.events.lock().unwrap().push(format!("ok {step}: {detail}"));
        }
        fn on_step_error(&self, step: &WorkflowStep, _error: &str) {
            self.events.lock().unwrap().push(format!("err {step}"));
        }
    }

    fn analysis() -> CareerAnalysis {
        CareerAnalysis {
            skills: vec!["Excel".into(), "SQL".into()],
            career: "Data Analyst".into(),
            recommendation: "Learn Power BI".into(),
            career_meta: Some(CareerMeta {
                career_type: CareerType::Tech,
                estimated_years: 1,
                average_salary: 6000.0,
                job_growth: 35,
                future_career: true,
            }),
            career_meta_error: None,
        }
    }

    fn ok_body(id: i64) -> String {
        json!({"success": true, "data": {"id": id}}).to_string()
    }

    #[tokio::test]
    async fn full_save_with_one_failing_skill() {
        let mut server = mockito::Server::new_async().await;
        let _excel = server
            .mock("POST", "/api/v1/Skills")
            .match_body(Matcher::PartialJson(json!({"name": "Excel"})))
            .with_status(201)
            .with_body(ok_body(1))
            .create_async()
            .await;
        let _sql = server
            .mock("POST", "/api/v1/Skills")
            .match_body(Matcher::PartialJson(json!({"name": "SQL"})))
            .with_status(500)
            .with_body("db down")
            .create_async()
            .await;
        let _skill_get = server
            .mock("GET", "/api/v1/Skills/1")
            .with_status(200)
            .with_body(json!({"success": true, "data": {"id": 1, "name": "Excel"}}).to_string())
            .create_async()
            .await;
        let _career = server
            .mock("POST", "/api/v1/CareerPaths")
            .match_body(Matcher::PartialJson(
                json!({"title": "Data Analyst", "type": 0, "jobGrowth": 35}),
            ))
            .with_status(201)
            .with_body(ok_body(7))
            .create_async()
            .await;
        let _career_get = server
            .mock("GET", "/api/v1/CareerPaths/7")
            .with_status(200)
            .with_body(ok_body(7))
            .create_async()
            .await;
        let _pred = server
            .mock("POST", "/api/v1/CareerPredictions/generate")
            .match_body(Matcher::Json(json!({"userId": 3, "careerPathId": 7, "type": 1})))
            .with_status(200)
            .with_body(ok_body(11))
            .create_async()
            .await;
        let _pred_get = server
            .mock("GET", "/api/v1/CareerPredictions/11")
            .with_status(200)
            .with_body(
                json!({"success": true, "data": {"id": 11, "compatibilityScore": 0.9}})
                    .to_string(),
            )
            .create_async()
            .await;

        let recorder = Arc::new(Recorder::default());
        let config = AnalysisConfig::builder()
            .user_id(3)
            .progress_callback(recorder.clone())
            .build()
            .unwrap();
        let client = BackendClient::new(server.url(), 5).unwrap();

        let saved = save_analysis(&analysis(), &client, &config).await;

        assert_eq!(saved.skills.len(), 2);
        assert_eq!(saved.skills[0].stored.as_ref().map(|s| s.id), Some(1));
        assert!(saved.skills[0].error.is_none());
        assert!(matches!(
            saved.skills[1].error,
            Some(StepError::SkillFailed { .. })
        ));
        assert_eq!(saved.career.created().map(|c| c.id), Some(7));
        match &saved.prediction {
            StepOutcome::Saved { stored, .. } => {
                assert_eq!(stored.as_ref().and_then(|p| p.compatibility_score), Some(0.9));
            }
            other => panic!("unexpected prediction outcome: {other:?}"),
        }
        // 2 skill calls, 2 career calls, 2 prediction calls succeeded.
        assert_eq!(saved.succeeded, 6);
        assert_eq!(saved.failed, 1);

        let events = recorder.events.lock().unwrap();
        assert_eq!(events[0], "stage Saving skills");
        assert!(events.iter().any(|e| e == "err skill 'SQL'"));
        assert!(events.iter().any(|e| e == "stage Generating prediction"));
    }

    #[tokio::test]
    async fn career_and_prediction_skipped_without_meta() {
        let mut server = mockito::Server::new_async().await;
        let career = server
            .mock("POST", "/api/v1/CareerPaths")
            .expect(0)
            .create_async()
            .await;
        let pred = server
            .mock("POST", "/api/v1/CareerPredictions/generate")
            .expect(0)
            .create_async()
            .await;

        let mut a = analysis();
        a.skills.clear();
        a.career_meta = None;

        let config = AnalysisConfig::default();
        let client = BackendClient::new(server.url(), 5).unwrap();
        let saved = save_analysis(&a, &client, &config).await;

        assert!(saved.career.is_skipped());
        assert!(saved.prediction.is_skipped());
        assert_eq!(saved.succeeded, 0);
        assert_eq!(saved.failed, 0);
        career.assert_async().await;
        pred.assert_async().await;
    }

    #[tokio::test]
    async fn malformed_meta_still_saves_skills() {
        let mut server = mockito::Server::new_async().await;
        let skill = server
            .mock("POST", "/api/v1/Skills")
            .match_body(Matcher::PartialJson(json!({"name": "Python"})))
            .with_status(201)
            .with_body(ok_body(4))
            .expect(1)
            .create_async()
            .await;
        let _skill_get = server
            .mock("GET", "/api/v1/Skills/4")
            .with_status(200)
            .with_body(ok_body(4))
            .create_async()
            .await;
        let career = server
            .mock("POST", "/api/v1/CareerPaths")
            .expect(0)
            .create_async()
            .await;

        let a = CareerAnalysis::from_value(json!({
            "skills": ["Python"],
            "career": "Data Scientist",
            "recommendation": "Study statistics",
            "career_meta": {
                "type": 7, "estimatedYears": 2, "averageSalary": 9000,
                "jobGrowth": 60, "futureCareer": true
            }
        }))
        .unwrap();
        let client = BackendClient::new(server.url(), 5).unwrap();
        let saved = save_analysis(&a, &client, &AnalysisConfig::default()).await;

        assert_eq!(saved.skills[0].stored.as_ref().map(|s| s.id), Some(4));
        match &saved.career {
            StepOutcome::Skipped { reason } => {
                assert!(reason.contains("unknown career type 7"), "got: {reason}");
            }
            other => panic!("unexpected career outcome: {other:?}"),
        }
        assert!(saved.prediction.is_skipped());
        assert_eq!((saved.succeeded, saved.failed), (2, 0));
        skill.assert_async().await;
        career.assert_async().await;
    }

    #[tokio::test]
    async fn prediction_skipped_when_career_creation_fails() {
        let mut server = mockito::Server::new_async().await;
        let _career = server
            .mock("POST", "/api/v1/CareerPaths")
            .with_status(400)
            .with_body("bad type")
            .create_async()
            .await;
        let pred = server
            .mock("POST", "/api/v1/CareerPredictions/generate")
            .expect(0)
            .create_async()
            .await;

        let mut a = analysis();
        a.skills.clear();
        let client = BackendClient::new(server.url(), 5).unwrap();
        let saved = save_analysis(&a, &client, &AnalysisConfig::default()).await;

        assert!(matches!(
            saved.career,
            StepOutcome::Failed {
                error: StepError::CareerFailed { .. }
            }
        ));
        assert!(saved.prediction.is_skipped());
        assert_eq!(saved.failed, 1);
        pred.assert_async().await;
    }

    #[tokio::test]
    async fn read_back_failure_keeps_created_record() {
        let mut server = mockito::Server::new_async().await;
        let _post = server
            .mock("POST", "/api/v1/Skills")
            .with_status(201)
            .with_body(ok_body(5))
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/api/v1/Skills/5")
            .with_status(404)
            .create_async()
            .await;

        let a = CareerAnalysis {
            skills: vec!["Python".into()],
            ..CareerAnalysis::default()
        };
        let client = BackendClient::new(server.url(), 5).unwrap();
        let saved = save_analysis(&a, &client, &AnalysisConfig::default()).await;

        let skill = &saved.skills[0];
        assert_eq!(skill.created.as_ref().map(|s| s.id), Some(5));
        assert!(skill.stored.is_none());
        assert!(matches!(
            skill.error,
            Some(StepError::ReadBackFailed { id: 5, .. })
        ));
        assert_eq!((saved.succeeded, saved.failed), (1, 1));
    }

    #[tokio::test]
    async fn analyze_bytes_rejects_unknown_format_before_provider_lookup() {
        let config = AnalysisConfig::default();
        let err = analyze_bytes("cv.docx", b"PK\x03\x04 not a resume".to_vec(), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, Cv2CareerError::UnsupportedDocument { .. }));
    }

    #[tokio::test]
    async fn analyze_missing_file_is_fatal() {
        let config = AnalysisConfig::default();
        let err = analyze("/definitely/not/here/cv.pdf", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, Cv2CareerError::FileNotFound { .. }));
    }
}
