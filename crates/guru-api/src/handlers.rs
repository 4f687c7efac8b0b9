//! Route handler functions for all API endpoints.
//!
//! Bodies are taken as `Result<Json<T>, JsonRejection>` so malformed JSON is
//! reported in the same `{error}` shape as every other failure.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, error};

use guru_chat::{validate_input, ChatReply, MAX_MESSAGE_LENGTH, MAX_QUERY_LENGTH};
use guru_core::types::{BusinessContext, Message, Role};

use crate::error::ApiError;
use crate::state::AppState;

const INVALID_JSON: &str = "Invalid JSON in request body";
const BI_FAILURE: &str = "Failed to process business intelligence request";
const CHAT_FAILURE: &str = "Failed to process chat request";

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct BusinessIntelligenceRequest {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BusinessIntelligenceResponse {
    pub response: String,
    pub context: BusinessContext,
}

/// One prior turn as sent by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationEntry {
    pub role: Role,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    /// Accepted for client compatibility; the reply shape is fixed.
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub business_context: SuppliedContext,
    #[serde(default)]
    pub conversation: Vec<ConversationEntry>,
}

/// The `businessContext` field of a chat request.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SuppliedContext {
    /// Field omitted: context is aggregated server-side.
    #[default]
    Absent,
    /// `""`, `null` or any other non-object: answer without context.
    Blank,
    Provided(BusinessContext),
}

impl<'de> Deserialize<'de> for SuppliedContext {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Context(BusinessContext),
            Other(IgnoredAny),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Context(context) => SuppliedContext::Provided(context),
            Raw::Other(_) => SuppliedContext::Blank,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub knowledge_snippets: u64,
}

// =============================================================================
// Handler functions
// =============================================================================

/// POST /api/business-intelligence - aggregate context and ask for advice.
pub async fn business_intelligence(
    State(state): State<AppState>,
    body: Result<Json<BusinessIntelligenceRequest>, JsonRejection>,
) -> Result<Json<BusinessIntelligenceResponse>, ApiError> {
    let Json(req) = body.map_err(|_| ApiError::BadRequest(INVALID_JSON.to_string()))?;
    let query = req
        .query
        .ok_or_else(|| ApiError::BadRequest("Query is required".to_string()))?;
    validate_input(&query, MAX_QUERY_LENGTH).map_err(|e| ApiError::from_chat(e, BI_FAILURE))?;
    state
        .orchestrator
        .ensure_ready()
        .map_err(|e| ApiError::from_chat(e, BI_FAILURE))?;

    let context = state.aggregator.aggregate(&query).await;
    let response = state
        .orchestrator
        .analyze(&query, &context)
        .await
        .map_err(|e| {
            error!(error = %e, "business intelligence request failed");
            ApiError::from_chat(e, BI_FAILURE)
        })?;

    Ok(Json(BusinessIntelligenceResponse { response, context }))
}

/// POST /api/ai-chat - one chat turn with client-supplied history.
pub async fn ai_chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(req) = body.map_err(|_| ApiError::BadRequest(INVALID_JSON.to_string()))?;
    let message = req
        .message
        .ok_or_else(|| ApiError::BadRequest("Message is required".to_string()))?;
    validate_input(&message, MAX_MESSAGE_LENGTH)
        .map_err(|e| ApiError::from_chat(e, CHAT_FAILURE))?;
    state
        .orchestrator
        .ensure_ready()
        .map_err(|e| ApiError::from_chat(e, CHAT_FAILURE))?;

    let history: Vec<Message> = req
        .conversation
        .into_iter()
        .map(|entry| match entry.role {
            Role::User => Message::user(entry.content),
            Role::Assistant => Message::assistant(entry.content, None),
        })
        .collect();

    let context = match req.business_context {
        SuppliedContext::Absent => Some(state.aggregator.aggregate(&message).await),
        SuppliedContext::Blank => None,
        SuppliedContext::Provided(context) => Some(context),
    };
    debug!(history = history.len(), format = ?req.format, "chat request");

    let reply = state
        .orchestrator
        .respond(&message, &history, context.as_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "chat request failed");
            ApiError::from_chat(e, CHAT_FAILURE)
        })?;

    Ok(Json(reply))
}

/// GET /health - liveness and basic counters.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let knowledge_snippets = state.knowledge.count().unwrap_or(0);

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        knowledge_snippets,
    })
}
