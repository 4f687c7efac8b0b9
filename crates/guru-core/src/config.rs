use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{GuruError, Result};

/// Top-level configuration for the Guru application.
///
/// Loaded from `~/.guru/config.toml` by default. Each section corresponds
/// to a bounded context or cross-cutting concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuruConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub conversations: ConversationConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl GuruConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: GuruConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| GuruError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.guru/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Extra CORS origins. Localhost on the configured port is always allowed.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3040,
            allowed_origins: vec![],
        }
    }
}

/// Generative model endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// API key for the model endpoint. `GEMINI_API_KEY` overrides it at startup.
    pub api_key: Option<String>,
    /// Model identifier, e.g. "gemini-2.0-flash".
    pub model: String,
    /// Base URL up to and excluding `/models/...`.
    pub base_url: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            temperature: 0.7,
            max_output_tokens: 1000,
        }
    }
}

/// Knowledge store retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Number of snippets retrieved per query, ranked by relevance.
    pub top_k: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

/// Enrichment provider settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Market data API key. Without it the market data snapshot stays empty.
    pub market_data_api_key: Option<String>,
}

/// Conversation retention and titling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Maximum conversations retained per user (oldest inserted evicted first).
    pub max_retained: usize,
    /// Length of the provisional title taken from the first message.
    pub provisional_title_chars: usize,
    /// Number of words used when title generation fails.
    pub fallback_title_words: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_retained: 50,
            provisional_title_chars: 32,
            fallback_title_words: 8,
        }
    }
}

/// Static allow-list authentication.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Permitted user identities (emails). Empty means no restriction.
    pub allowed_users: Vec<String>,
}

impl AuthConfig {
    /// Check a user identity against the allow-list, ignoring case and
    /// surrounding whitespace.
    pub fn is_allowed(&self, user: &str) -> bool {
        if self.allowed_users.is_empty() {
            return true;
        }
        let user = user.trim().to_lowercase();
        if user.is_empty() {
            return false;
        }
        self.allowed_users
            .iter()
            .any(|allowed| allowed.trim().to_lowercase() == user)
    }
}
