//! Error types for the conversational pipeline.

use guru_core::error::GuruError;

/// Coarse classification used when surfacing an error to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input shape or size; always user-correctable.
    Validation,
    /// Generative model or enrichment failure.
    Upstream,
    /// Storage read/write failure; non-fatal.
    Persistence,
}

/// Errors from the chat pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),
    #[error("missing model API key")]
    MissingApiKey,
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::EmptyMessage
            | ChatError::MessageTooLong(_)
            | ChatError::ConversationNotFound(_) => ErrorKind::Validation,
            ChatError::MissingApiKey | ChatError::Upstream(_) => ErrorKind::Upstream,
            ChatError::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

impl From<GuruError> for ChatError {
    fn from(err: GuruError) -> Self {
        ChatError::Persistence(err.to_string())
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Upstream(err.to_string())
    }
}
