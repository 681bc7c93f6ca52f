//! Task executor
//!
//! Turns a job payload into the payload reported back to the job server:
//! runs the inference backend on it and serializes the structured response
//! as JSON. Holds no connection and no per-job state.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{Span, debug};

use crate::service::inference::{GenerationParams, InferenceBackend};

/// Why a job could not be turned into a result
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("inference failed: {0:#}")]
    Inference(anyhow::Error),

    #[error("failed to serialize inference output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("inference task aborted: {0}")]
    Panicked(String),
}

/// Service trait for processing job payloads
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Processes a job payload
    ///
    /// # Returns
    /// The serialized result to report for the job
    async fn execute(&self, payload: &str) -> Result<String, TaskError>;
}

/// Standard implementation of TaskExecutor
pub struct StandardTaskExecutor {
    backend: Arc<dyn InferenceBackend>,
    params: GenerationParams,
}

impl StandardTaskExecutor {
    /// Creates a new executor around `backend`
    pub fn new(backend: Arc<dyn InferenceBackend>, params: GenerationParams) -> Self {
        Self { backend, params }
    }
}

#[async_trait]
impl TaskExecutor for StandardTaskExecutor {
    async fn execute(&self, payload: &str) -> Result<String, TaskError> {
        let backend = Arc::clone(&self.backend);
        let params = self.params.clone();
        let prompt = payload.to_string();

        // Keep the backend's own logs inside the caller's span and subscriber.
        let span = Span::current();
        let dispatch = tracing::dispatcher::get_default(|dispatch| dispatch.clone());

        let response = tokio::task::spawn_blocking(move || {
            tracing::dispatcher::with_default(&dispatch, || {
                span.in_scope(|| backend.generate(&prompt, &params))
            })
        })
        .await
        .map_err(|e| TaskError::Panicked(e.to_string()))?
        .map_err(TaskError::Inference)?;

        debug!(
            status = %response.status,
            model = %response.model,
            "Inference finished"
        );

        Ok(serde_json::to_string(&response)?)
    }
}
