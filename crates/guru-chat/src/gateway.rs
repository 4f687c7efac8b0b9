//! Generative model gateway.
//!
//! One best-effort HTTP round-trip per call. No retries: a failed turn is
//! retried by the user re-sending.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use guru_core::config::ModelConfig;

use crate::error::ChatError;
use crate::types::{GenerationParams, Prompt};

/// A text-generation backend.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Generate raw text for `prompt`.
    async fn generate(&self, prompt: &Prompt, params: &GenerationParams)
        -> Result<String, ChatError>;

    /// Whether a call could be attempted at all, e.g. credentials are present.
    fn is_configured(&self) -> bool {
        true
    }
}

/// Gateway for the Gemini `generateContent` endpoint.
///
/// Cheap to clone: `reqwest::Client` is reference-counted internally.
#[derive(Debug, Clone)]
pub struct GeminiGateway {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiGateway {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            api_key,
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(&config.base_url, &config.model, config.api_key.clone())
    }

    fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl ModelGateway for GeminiGateway {
    async fn generate(
        &self,
        prompt: &Prompt,
        params: &GenerationParams,
    ) -> Result<String, ChatError> {
        let api_key = self.api_key().ok_or(ChatError::MissingApiKey)?;

        let payload = GenerateRequest {
            contents: vec![Content {
                parts: prompt
                    .parts()
                    .map(|text| Part {
                        text: text.to_string(),
                    })
                    .collect(),
            }],
            generation_config: GenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params.max_output_tokens,
            },
        };

        debug!(
            model = %self.model,
            parts = payload.contents[0].parts.len(),
            system_len = prompt.system.len(),
            "sending generateContent request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(model = %self.model, error = %e, "model request failed (transport)");
                ChatError::Upstream(format!("model request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, "model API returned an error");
            return Err(ChatError::Upstream(format!(
                "model API error ({}): {}",
                status, body
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Upstream(format!("invalid model response: {}", e)))?;

        body.first_text()
            .ok_or_else(|| ChatError::Upstream("invalid response from model API".to_string()))
    }

    fn is_configured(&self) -> bool {
        self.api_key().is_some()
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

impl GenerateResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()
            .map(|part| part.text)
            .filter(|text| !text.is_empty())
    }
}
