//! Configuration types for résumé analysis and backend submission.
//!
//! All behaviour is controlled through [`AnalysisConfig`], built via its
//! [`AnalysisConfigBuilder`]. Credentials and endpoints are supplied here at
//! startup rather than read from globals, so two configs can drive two
//! backends side by side in the same process.

use crate::error::Cv2CareerError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default vision model, used when no model is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Configuration for a résumé analysis run.
///
/// # Example
/// ```rust
/// use edgequake_cv2career::{AnalysisConfig, BackendConfig};
///
/// let config = AnalysisConfig::builder()
///     .model("gemini-2.0-flash")
///     .user_id(42)
///     .backend(BackendConfig::with_candidates(["http://localhost:5000"]))
///     .build()
///     .unwrap();
/// assert_eq!(config.user_id, 42);
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// LLM model identifier. If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Extraction wants the model to be literal, not creative.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 2048.
    pub max_tokens: usize,

    /// Custom analysis prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Job market the salary estimate refers to. Default: "Brazil".
    pub salary_market: String,

    /// Timeout for the model call in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Longest image edge sent to the model, in pixels. Default: 2000.
    ///
    /// Larger uploads (phone photos of a printed CV) are downscaled first.
    pub max_image_pixels: u32,

    /// Backend user the prediction is generated for. Default: 1.
    pub user_id: i64,

    /// Backend location and payload defaults.
    pub backend: BackendConfig,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 2048,
            system_prompt: None,
            salary_market: "Brazil".to_string(),
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            max_image_pixels: 2000,
            user_id: 1,
            backend: BackendConfig::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("salary_market", &self.salary_market)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_image_pixels", &self.max_image_pixels)
            .field("user_id", &self.user_id)
            .field("backend", &self.backend)
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model to request, falling back to [`DEFAULT_MODEL`].
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Where the career backend lives and how payloads are filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base addresses probed in order; the first healthy one is used.
    pub candidates: Vec<String>,
    /// Path appended to each candidate for the health probe. Default: "/health".
    pub health_path: String,
    /// Per-request timeout in seconds. Default: 30.
    pub timeout_secs: u64,
    /// `category` sent with every skill. Default: 1.
    pub skill_category: i32,
    /// `level` sent with every skill. Default: 1.
    pub skill_level: i32,
    /// `type` sent with the prediction request. Default: 1.
    pub prediction_type: i32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            candidates: Vec::new(),
            health_path: "/health".to_string(),
            timeout_secs: 30,
            skill_category: 1,
            skill_level: 1,
            prediction_type: 1,
        }
    }
}

impl BackendConfig {
    /// Defaults with the given candidate addresses.
    pub fn with_candidates<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// Builder for [`AnalysisConfig`].
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl fmt::Debug for AnalysisConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl AnalysisConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn salary_market(mut self, market: impl Into<String>) -> Self {
        self.config.salary_market = market.into();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn max_image_pixels(mut self, px: u32) -> Self {
        self.config.max_image_pixels = px.max(100);
        self
    }

    pub fn user_id(mut self, id: i64) -> Self {
        self.config.user_id = id;
        self
    }

    pub fn backend(mut self, backend: BackendConfig) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, Cv2CareerError> {
        let c = &self.config;
        if c.user_id < 1 {
            return Err(Cv2CareerError::InvalidConfig(format!(
                "User ID must be ≥ 1, got {}",
                c.user_id
            )));
        }
        if c.api_timeout_secs == 0 || c.download_timeout_secs == 0 || c.backend.timeout_secs == 0 {
            return Err(Cv2CareerError::InvalidConfig(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(Cv2CareerError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if !c.backend.health_path.starts_with('/') {
            return Err(Cv2CareerError::InvalidConfig(format!(
                "Health path must start with '/', got '{}'",
                c.backend.health_path
            )));
        }
        Ok(self.config)
    }
}
