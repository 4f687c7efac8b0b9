use thiserror::Error;

/// Top-level error type for the Guru system.
///
/// Subsystem crates define their own error types and implement
/// `From<GuruError>` where they need to absorb these, so that the `?`
/// operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GuruError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for GuruError {
    fn from(err: toml::de::Error) -> Self {
        GuruError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for GuruError {
    fn from(err: toml::ser::Error) -> Self {
        GuruError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for GuruError {
    fn from(err: serde_json::Error) -> Self {
        GuruError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Guru operations.
pub type Result<T> = std::result::Result<T, GuruError>;
