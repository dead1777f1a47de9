//! # edgequake-cv2career
//!
//! Turn a résumé into a career recommendation with a multimodal LLM, then
//! record the result in a career-planning backend.
//!
//! ## Why this crate?
//!
//! Models asked for "pure JSON" rarely deliver exactly that. Answers arrive
//! wrapped in Markdown fences, preceded by a friendly sentence or followed by
//! an explanation. [`extract_json`] recovers the first valid JSON value from
//! such text, and the rest of the crate builds a small, predictable workflow
//! around it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! résumé (PDF / PNG / JPEG)
//!  │
//!  ├─ 1. Input     read a local file, download a URL or accept bytes
//!  ├─ 2. Encode    base64 ImageData, oversized images downscaled
//!  ├─ 3. Model     one call to gemini-2.0-flash / gpt-4.1 / claude / …
//!  ├─ 4. Extract   tolerant JSON recovery from the raw answer
//!  ├─ 5. Validate  CareerAnalysis { skills, career, recommendation, career_meta }
//!  └─ 6. Backend   skills → career path → prediction (non-fatal per step)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_cv2career::{run, AnalysisConfig, BackendConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let config = AnalysisConfig::builder()
//!         .backend(BackendConfig::with_candidates(["http://localhost:5000"]))
//!         .build()?;
//!     let output = run("resume.pdf", &config).await?;
//!     println!("{}", output.analysis.analysis.career);
//!     for err in output.errors() {
//!         eprintln!("warning: {err}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `cv2career` binary (clap + anyhow + tracing-subscriber + indicatif + dotenvy) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-cv2career = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analysis;
pub mod backend;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analysis::{CareerAnalysis, CareerMeta, CareerType};
pub use backend::{BackendClient, BackendLocator, FixedLocator, HealthProbeLocator};
pub use config::{AnalysisConfig, AnalysisConfigBuilder, BackendConfig, DEFAULT_MODEL};
pub use error::{BackendError, Cv2CareerError, ExtractionError, StepError};
pub use output::{AnalysisOutput, SkillOutcome, StepOutcome, WorkflowOutput, WorkflowStats};
pub use pipeline::extract::extract_json;
pub use progress::{NoopProgressCallback, ProgressCallback, Stage, WorkflowProgressCallback, WorkflowStep};
pub use workflow::{analyze, analyze_bytes, run, run_with_locator, save_analysis};
