//! Prompt templates.
//!
//! Templates use `{{key}}` placeholders. Substitution is a single pass over
//! the template, so placeholder-like text inside substituted values (user
//! messages, context JSON) is left untouched.

use guru_core::types::{BusinessContext, Message, Role};

/// System prompt for a chat turn.
pub const CHAT_TEMPLATE: &str = "\
You are an expert in economics, business, and project management. For every user question:

1. Search for and cite the most relevant, up-to-date research, articles, or books from the web or literature (use real or plausible sources, and compare at least two if possible).
2. Analyze and compare the data, findings, or viewpoints from these sources in your reasoning process.
3. Synthesize the information to provide a compelling, insightful, and evidence-based answer.
4. Your reasoning should be sophisticated, critical, and reference the sources you found (with brief citations in the reasoning section).
5. Your final response should be concise, actionable, and reflect the best available knowledge.
6. If the question is ambiguous, clarify assumptions and suggest what further information would help.
7. Maintain a professional, approachable tone. No markdown or hashtags.

Business Context:
{{context}}

Conversation so far:
{{history}}

Format your response as:
REASONING:
[Your detailed, evidence-based analysis with citations]

RESPONSE:
[Your concise, actionable answer]";

/// Instruction for the one-shot business intelligence call.
pub const ANALYSIS_TEMPLATE: &str = "\
You are a business and startup guru with access to comprehensive market data, startup insights, and business knowledge.
Provide detailed, actionable advice based on the following context: {{context}}";

/// Wraps a user's first utterance for title generation.
pub const TITLE_TEMPLATE: &str = "\
Generate a short, relevant, human-like chat title (max 6 words, no punctuation, no quotes) for: {{message}}";

pub const NO_CONTEXT: &str = "No specific business context available.";
pub const NO_HISTORY: &str = "No prior conversation.";

/// Replace every `{{key}}` in `template` with its value from `vars`.
/// Unknown placeholders are kept verbatim.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = &after[..end];
                match vars.iter().find(|(k, _)| *k == key) {
                    Some((_, value)) => out.push_str(value),
                    None => {
                        out.push_str("{{");
                        out.push_str(key);
                        out.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Turn-labelled transcript of `history`.
///
/// Skips pending placeholders, empty entries, and entries whose content is
/// exactly `current` (the message being answered).
pub fn render_transcript(history: &[Message], current: &str) -> String {
    history
        .iter()
        .filter(|m| !m.is_pending && !m.content.is_empty() && m.content != current)
        .map(|m| {
            let label = match m.role {
                Role::User => "User",
                Role::Assistant => "AI",
            };
            format!("{}: {}", label, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// System prompt for a chat turn.
pub fn chat_system_prompt(context: Option<&BusinessContext>, transcript: &str) -> String {
    let context_text = context
        .and_then(|ctx| serde_json::to_string_pretty(ctx).ok())
        .unwrap_or_else(|| NO_CONTEXT.to_string());
    let history = if transcript.is_empty() {
        NO_HISTORY
    } else {
        transcript
    };
    render(
        CHAT_TEMPLATE,
        &[("context", &context_text), ("history", history)],
    )
}

pub fn analysis_prompt(context: &BusinessContext) -> String {
    let context_text = serde_json::to_string(context).unwrap_or_else(|_| "{}".to_string());
    render(ANALYSIS_TEMPLATE, &[("context", &context_text)])
}

pub fn title_request(first_message: &str) -> String {
    render(TITLE_TEMPLATE, &[("message", first_message)])
}
