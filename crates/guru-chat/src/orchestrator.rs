//! Chat orchestrator: prompt construction, model invocation, reply parsing.
//!
//! Stateless per request. Conversation state lives in
//! [`ConversationManager`](crate::lifecycle::ConversationManager).

use std::sync::Arc;

use tracing::{debug, warn};

use guru_core::types::{BusinessContext, Message};

use crate::error::ChatError;
use crate::gateway::ModelGateway;
use crate::parser::{DelimitedResponseParser, ResponseParser};
use crate::prompt;
use crate::types::{ChatReply, GenerationParams, Prompt};

/// Maximum chat message length in characters.
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// Maximum business intelligence query length in characters.
pub const MAX_QUERY_LENGTH: usize = 1000;

const DEFAULT_FALLBACK_WORDS: usize = 8;

/// Sequences prompt building, the gateway call and parsing for one turn.
pub struct ChatOrchestrator {
    gateway: Arc<dyn ModelGateway>,
    parser: Box<dyn ResponseParser>,
    params: GenerationParams,
}

impl ChatOrchestrator {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            gateway,
            parser: Box::new(DelimitedResponseParser),
            params: GenerationParams::default(),
        }
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_parser(mut self, parser: Box<dyn ResponseParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Answer `message` given prior `history` and an optional precomputed context.
    ///
    /// Validation happens before any gateway call.
    pub async fn respond(
        &self,
        message: &str,
        history: &[Message],
        context: Option<&BusinessContext>,
    ) -> Result<ChatReply, ChatError> {
        validate_input(message, MAX_MESSAGE_LENGTH)?;

        let transcript = prompt::render_transcript(history, message);
        let system = prompt::chat_system_prompt(context, &transcript);
        debug!(
            history = history.len(),
            transcript_len = transcript.len(),
            has_context = context.is_some(),
            "built chat prompt"
        );

        let raw = self
            .gateway
            .generate(&Prompt::new(system, message), &self.params)
            .await?;
        if raw.trim().is_empty() {
            return Err(ChatError::Upstream("empty response from model".to_string()));
        }

        // A reply truncated right after the delimiter has an empty response.
        let parsed = self.parser.parse(&raw);
        match parsed.response.filter(|r| !r.is_empty()) {
            Some(response) => Ok(ChatReply {
                message: response,
                reasoning: parsed.reasoning,
            }),
            None if parsed.reasoning.is_empty() => Err(ChatError::Upstream(
                "model reply had no content".to_string(),
            )),
            None => {
                debug!("model reply had no usable response section, surfacing full text");
                Ok(ChatReply {
                    message: parsed.reasoning,
                    reasoning: String::new(),
                })
            }
        }
    }

    /// Fail fast when the model cannot be called, before any context work.
    pub fn ensure_ready(&self) -> Result<(), ChatError> {
        if self.gateway.is_configured() {
            Ok(())
        } else {
            Err(ChatError::MissingApiKey)
        }
    }

    /// One-shot advice for `query` grounded in `context`. Returns raw model text.
    pub async fn analyze(&self, query: &str, context: &BusinessContext) -> Result<String, ChatError> {
        validate_input(query, MAX_QUERY_LENGTH)?;

        let prompt = Prompt::new(prompt::analysis_prompt(context), query);
        let raw = self.gateway.generate(&prompt, &self.params).await?;
        if raw.trim().is_empty() {
            return Err(ChatError::Upstream("empty response from model".to_string()));
        }
        Ok(raw)
    }

    /// Short title for a conversation opened by `first_message`.
    ///
    /// Runs an ordinary turn whose message is the title request, with no
    /// history and no context. Never fails: any error or blank reply yields
    /// [`fallback_title`] over `fallback_words` words.
    pub async fn generate_title(&self, first_message: &str, fallback_words: usize) -> String {
        let request = prompt::title_request(first_message);
        match self.respond(&request, &[], None).await {
            Ok(reply) => {
                let title = clean_title(&reply.message);
                if title.is_empty() {
                    fallback_title(first_message, fallback_words)
                } else {
                    title
                }
            }
            Err(e) => {
                warn!(error = %e, "title generation failed, using fallback");
                fallback_title(first_message, fallback_words)
            }
        }
    }
}

/// First `words` whitespace-separated words of `text`.
pub fn fallback_title(text: &str, words: usize) -> String {
    let words = if words == 0 { DEFAULT_FALLBACK_WORDS } else { words };
    text.split_whitespace()
        .take(words)
        .collect::<Vec<_>>()
        .join(" ")
}

fn clean_title(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

/// Reject blank text and text longer than `max_chars` characters.
pub fn validate_input(text: &str, max_chars: usize) -> Result<(), ChatError> {
    if text.trim().is_empty() {
        return Err(ChatError::EmptyMessage);
    }
    if text.chars().count() > max_chars {
        return Err(ChatError::MessageTooLong(max_chars));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
