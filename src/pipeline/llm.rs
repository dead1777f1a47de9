//! Model interaction: build the vision request and call the provider.
//!
//! All prompt wording lives in [`crate::prompts`]; this module only
//! assembles messages, applies the timeout and maps provider errors.
//! There is exactly one call per résumé. If the answer cannot be parsed the
//! caller surfaces the raw text instead of asking again.

use crate::config::AnalysisConfig;
use crate::error::Cv2CareerError;
use crate::prompts::{analysis_prompt, USER_INSTRUCTION};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::debug;

/// The model's unprocessed answer plus accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelAnswer {
    /// Raw text, exactly as returned.
    pub raw: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
}

/// Send the résumé to the model and return its raw answer.
///
/// ## Message Layout
///
/// 1. **System message**: the analysis prompt (or user-supplied override)
/// 2. **User message**: a one-line instruction with the résumé attached
pub async fn analyze_document(
    provider: &Arc<dyn LLMProvider>,
    attachment: ImageData,
    config: &AnalysisConfig,
) -> Result<ModelAnswer, Cv2CareerError> {
    let start = Instant::now();
    let messages = build_messages(attachment, config);
    let options = build_options(config);

    let call = provider.chat(&messages, Some(&options));
    let response = timeout(Duration::from_secs(config.api_timeout_secs), call)
        .await
        .map_err(|_| Cv2CareerError::ApiTimeout {
            elapsed_ms: start.elapsed().as_millis() as u64,
        })?
        .map_err(|e| Cv2CareerError::LlmApiError {
            message: e.to_string(),
        })?;

    let duration = start.elapsed();
    debug!(
        "Model answered: {} input tokens, {} output tokens, {:?}",
        response.prompt_tokens, response.completion_tokens, duration
    );

    if response.content.trim().is_empty() {
        return Err(Cv2CareerError::EmptyModelOutput);
    }

    Ok(ModelAnswer {
        raw: response.content,
        input_tokens: response.prompt_tokens,
        output_tokens: response.completion_tokens,
        duration_ms: duration.as_millis() as u64,
    })
}

fn build_messages(attachment: ImageData, config: &AnalysisConfig) -> Vec<ChatMessage> {
    let system_prompt = config
        .system_prompt
        .clone()
        .unwrap_or_else(|| analysis_prompt(&config.salary_market));

    vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user_with_images(USER_INSTRUCTION, vec![attachment]),
    ]
}

/// Build `CompletionOptions` from the analysis config.
fn build_options(config: &AnalysisConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
