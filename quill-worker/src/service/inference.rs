//! Inference backend
//!
//! The text-generation collaborator the worker runs jobs through. Real model
//! serving lives outside this crate; it plugs in by implementing
//! [`InferenceBackend`]. Plain closures with the right signature work too.

use anyhow::Result;
use quill_core::domain::inference::InferenceResponse;
use tracing::debug;

/// Text the placeholder backend answers every prompt with
pub const PLACEHOLDER_TEXT: &str = "response text";

/// Per-request generation settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationParams {
    /// Upper bound on generated tokens, `None` for the backend default
    pub max_output_tokens: Option<u32>,
}

/// A text-generation backend
///
/// Called from a blocking thread, so implementations may block freely.
pub trait InferenceBackend: Send + Sync {
    /// Generates a response for `prompt`
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<InferenceResponse>;
}

impl<F> InferenceBackend for F
where
    F: Fn(&str, &GenerationParams) -> Result<InferenceResponse> + Send + Sync,
{
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<InferenceResponse> {
        self(prompt, params)
    }
}

/// Backend that answers every prompt with a fixed text
///
/// Stands in for a model so the polling protocol can run end to end.
pub struct PlaceholderBackend {
    model: String,
}

impl PlaceholderBackend {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

impl InferenceBackend for PlaceholderBackend {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<InferenceResponse> {
        debug!(model = %self.model, prompt_len = prompt.len(), "Generating placeholder response");
        Ok(InferenceResponse::completed(&self.model, PLACEHOLDER_TEXT)
            .with_max_output_tokens(params.max_output_tokens))
    }
}
