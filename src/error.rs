//! Error types for the edgequake-cv2career library.
//!
//! Four error types reflect four distinct failure modes:
//!
//! * [`Cv2CareerError`] — **Fatal**: the workflow cannot proceed at all
//!   (unreadable résumé, provider not configured, model output with no JSON,
//!   no backend reachable). Returned as `Err(Cv2CareerError)` from the
//!   top-level [`crate::workflow`] functions.
//!
//! * [`ExtractionError`] — the model answered, but nothing in its answer
//!   parses as JSON. Always carries the text so an operator can see what the
//!   model actually said. Wrapped by [`Cv2CareerError::Extraction`].
//!
//! * [`BackendError`] — a single HTTP call to the career backend failed.
//!
//! * [`StepError`] — **Non-fatal**: one backend step (a skill, the career
//!   path, the prediction) failed but the rest of the workflow carries on.
//!   Stored inside [`crate::output::WorkflowOutput`] so callers can inspect
//!   partial success.

use std::path::PathBuf;
use thiserror::Error;

/// No syntactically valid JSON candidate was found in the model output.
///
/// `raw` is the text after fence and invisible-character stripping, verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No valid JSON found in the model response.\nRaw output:\n{raw}")]
pub struct ExtractionError {
    pub raw: String,
}

/// All fatal errors returned by the edgequake-cv2career library.
#[derive(Debug, Error)]
pub enum Cv2CareerError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Résumé file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The document was read but contains no bytes.
    #[error("Résumé '{name}' is empty")]
    EmptyDocument { name: String },

    /// The document is not a PDF, PNG or JPEG (or could not be decoded).
    #[error("Unsupported résumé '{name}': {detail}\nAccepted formats: PDF, PNG, JPG, JPEG.")]
    UnsupportedDocument { name: String, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM API returned an error.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// The LLM call did not finish within `api_timeout_secs`.
    #[error("LLM call timed out after {elapsed_ms}ms\nIncrease --api-timeout.")]
    ApiTimeout { elapsed_ms: u64 },

    /// The model answered with no text at all.
    #[error("LLM returned an empty response")]
    EmptyModelOutput,

    // ── Extraction / schema errors ────────────────────────────────────────
    /// No JSON value could be recovered from the model output.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// JSON was recovered but does not match the career-analysis shape.
    #[error("Model output does not match the expected analysis shape: {detail}")]
    InvalidAnalysis { detail: String },

    // ── Backend errors ────────────────────────────────────────────────────
    /// Every backend candidate failed its health probe.
    #[error("No career backend is reachable (tried: {})\nStart the backend or pass --backend <URL>.", .tried.join(", "))]
    NoBackendReachable { tried: Vec<String> },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Cv2CareerError {
    /// The raw model output, when the failure happened after the model answered.
    pub fn raw_model_output(&self) -> Option<&str> {
        match self {
            Cv2CareerError::Extraction(e) => Some(&e.raw),
            _ => None,
        }
    }
}

/// A failed call to the career backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport-level failure (connection refused, timeout, TLS…).
    #[error("Request to '{url}' failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with an unexpected HTTP status.
    #[error("Backend returned HTTP {status} for '{url}': {body}")]
    Status { url: String, status: u16, body: String },

    /// The envelope said `success: false` or carried no data.
    #[error("Backend rejected request to '{url}': {message}")]
    Rejected { url: String, message: String },

    /// The body was not the expected envelope.
    #[error("Could not decode backend response from '{url}': {detail}")]
    Decode { url: String, detail: String },
}

/// A non-fatal error for a single backend step.
///
/// Stored alongside the step outcome in [`crate::output::WorkflowOutput`].
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum StepError {
    /// Creating a skill failed.
    #[error("Skill '{skill}': {detail}")]
    SkillFailed { skill: String, detail: String },

    /// Creating the career path failed.
    #[error("Career path '{career}': {detail}")]
    CareerFailed { career: String, detail: String },

    /// Generating the prediction failed.
    #[error("Prediction for career path {career_path_id}: {detail}")]
    PredictionFailed { career_path_id: i64, detail: String },

    /// A resource was created but could not be read back.
    #[error("Reading back {resource} {id} failed: {detail}")]
    ReadBackFailed {
        resource: String,
        id: i64,
        detail: String,
    },
}
