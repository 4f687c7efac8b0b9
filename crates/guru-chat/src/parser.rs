//! Structured-output parsing of raw model text.
//!
//! The model is asked to answer as `REASONING: ... RESPONSE: ...`. The
//! [`ResponseParser`] trait hides that textual protocol from the orchestrator.

/// Delimiter between the reasoning and response sections.
pub const RESPONSE_DELIMITER: &str = "RESPONSE:";
/// Optional label in front of the reasoning section.
pub const REASONING_LABEL: &str = "REASONING:";

/// Raw model output split into its two sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub reasoning: String,
    /// `None` when the output carried no response section.
    pub response: Option<String>,
}

/// Splits raw model output into reasoning and response.
pub trait ResponseParser: Send + Sync {
    fn parse(&self, raw: &str) -> ParsedResponse;
}

/// Parser for the `REASONING:` / `RESPONSE:` text protocol.
#[derive(Debug, Default, Clone, Copy)]
pub struct DelimitedResponseParser;

impl ResponseParser for DelimitedResponseParser {
    fn parse(&self, raw: &str) -> ParsedResponse {
        match raw.split_once(RESPONSE_DELIMITER) {
            Some((before, after)) => ParsedResponse {
                reasoning: strip_reasoning_label(before.trim()).to_string(),
                response: Some(after.trim().to_string()),
            },
            None => ParsedResponse {
                reasoning: raw.trim().to_string(),
                response: None,
            },
        }
    }
}

fn strip_reasoning_label(text: &str) -> &str {
    text.strip_prefix(REASONING_LABEL)
        .map(str::trim_start)
        .unwrap_or(text)
}
