//! Request/response types shared across the pipeline.

use serde::{Deserialize, Serialize};

use guru_core::config::ModelConfig;

/// Final answer of one chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub message: String,
    pub reasoning: String,
}

/// Prompt sent to the model: system instructions followed by content segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub segments: Vec<String>,
}

impl Prompt {
    pub fn new(system: impl Into<String>, segment: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            segments: vec![segment.into()],
        }
    }

    /// All parts in wire order.
    pub fn parts(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.system.as_str()).chain(self.segments.iter().map(String::as_str))
    }
}

/// Sampling parameters for one generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 1000,
        }
    }
}

impl From<&ModelConfig> for GenerationParams {
    fn from(config: &ModelConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }
}
