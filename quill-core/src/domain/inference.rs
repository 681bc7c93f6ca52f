//! Inference output format
//!
//! Structured response produced by a text-generation backend. Serialized as
//! JSON, it becomes the payload reported for a job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response of a single generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub status: InferenceStatus,
    pub max_output_tokens: Option<u32>,
    pub model: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    pub output: Vec<OutputItem>,
}

impl InferenceResponse {
    /// Builds a completed response holding a single text message.
    pub fn completed(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            status: InferenceStatus::Completed,
            max_output_tokens: None,
            model: model.into(),
            created_at: Utc::now(),
            output: vec![OutputItem::Message {
                content: vec![OutputContent::OutputText { text: text.into() }],
            }],
        }
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: Option<u32>) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Concatenated text of every output message.
    pub fn output_text(&self) -> String {
        self.output
            .iter()
            .flat_map(|item| match item {
                OutputItem::Message { content } => content.iter(),
            })
            .map(|content| match content {
                OutputContent::OutputText { text } => text.as_str(),
            })
            .collect()
    }
}

/// Generation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceStatus {
    Completed,
    Incomplete,
    Failed,
}

impl std::fmt::Display for InferenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InferenceStatus::Completed => write!(f, "completed"),
            InferenceStatus::Incomplete => write!(f, "incomplete"),
            InferenceStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message { content: Vec<OutputContent> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputContent {
    OutputText { text: String },
}
