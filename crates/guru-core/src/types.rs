use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GuruError;

// =============================================================================
// Enums
// =============================================================================

/// Author of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    /// The model. Older clients send `"ai"`.
    #[serde(alias = "ai")]
    Assistant,
}

/// Kind of message payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    Text,
    Image,
}

/// Topic bucket of a knowledge snippet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeCategory {
    Startup,
    Market,
    Finance,
    Strategy,
    Legal,
    Technology,
    Innovation,
}

impl KnowledgeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            KnowledgeCategory::Startup => "startup",
            KnowledgeCategory::Market => "market",
            KnowledgeCategory::Finance => "finance",
            KnowledgeCategory::Strategy => "strategy",
            KnowledgeCategory::Legal => "legal",
            KnowledgeCategory::Technology => "technology",
            KnowledgeCategory::Innovation => "innovation",
        }
    }
}

impl fmt::Display for KnowledgeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KnowledgeCategory {
    type Err = GuruError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "startup" => Ok(KnowledgeCategory::Startup),
            "market" => Ok(KnowledgeCategory::Market),
            "finance" => Ok(KnowledgeCategory::Finance),
            "strategy" => Ok(KnowledgeCategory::Strategy),
            "legal" => Ok(KnowledgeCategory::Legal),
            "technology" => Ok(KnowledgeCategory::Technology),
            "innovation" => Ok(KnowledgeCategory::Innovation),
            other => Err(GuruError::Serialization(format!(
                "unknown knowledge category '{}'",
                other
            ))),
        }
    }
}

// =============================================================================
// Conversation data
// =============================================================================

/// A single entry in a conversation thread.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(default = "Utc::now", deserialize_with = "epoch_or_rfc3339::deserialize")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Transient "response in flight" marker. Always replaced, never mutated.
    #[serde(default)]
    pub is_pending: bool,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            content_type: ContentType::Text,
            timestamp: Utc::now(),
            reasoning: None,
            is_pending: false,
        }
    }

    pub fn assistant(content: impl Into<String>, reasoning: Option<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            content_type: ContentType::Text,
            timestamp: Utc::now(),
            reasoning,
            is_pending: false,
        }
    }

    /// Placeholder shown while the assistant response is in flight.
    pub fn pending() -> Self {
        Self {
            is_pending: true,
            ..Self::assistant(String::new(), None)
        }
    }

    /// Assistant message reporting a failed turn.
    pub fn error(detail: &str) -> Self {
        Self::assistant(
            format!(
                "Error: {}. Please try again or contact support if the issue persists.",
                detail
            ),
            None,
        )
    }
}

/// A titled conversation thread.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    #[serde(deserialize_with = "epoch_or_rfc3339::deserialize")]
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Start a conversation with a fresh unique id.
    pub fn new(title: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            messages,
            created_at: Utc::now(),
        }
    }

    pub fn has_pending(&self) -> bool {
        self.messages.iter().any(|m| m.is_pending)
    }
}

/// Stored timestamps are RFC 3339 strings, or Unix epoch milliseconds in
/// sets written by older web clients.
mod epoch_or_rfc3339 {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{de, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Fractional(f64),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => ms,
            Raw::Fractional(ms) => ms as i64,
            Raw::Text(text) => {
                return DateTime::parse_from_rfc3339(&text)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(de::Error::custom);
            }
        };
        Utc.timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {}", millis)))
    }
}

// =============================================================================
// Business context
// =============================================================================

/// Point-in-time data from one enrichment provider. Empty means "no data".
pub type Snapshot = serde_json::Map<String, serde_json::Value>;

/// A stored, categorized business fact with provenance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeSnippet {
    pub category: KnowledgeCategory,
    pub content: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

/// Aggregated per-query context handed to the model.
///
/// Every field is always present; missing data is an empty map or list.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BusinessContext {
    pub market_data: Snapshot,
    pub startup_insights: Snapshot,
    pub technology_trends: Snapshot,
    pub innovation_insights: Snapshot,
    pub knowledge_base: Vec<KnowledgeSnippet>,
}

impl BusinessContext {
    pub fn is_empty(&self) -> bool {
        self.market_data.is_empty()
            && self.startup_insights.is_empty()
            && self.technology_trends.is_empty()
            && self.innovation_insights.is_empty()
            && self.knowledge_base.is_empty()
    }
}
