//! Conversational pipeline for Guru.
//!
//! Aggregates business context, builds prompts, calls the generative model,
//! parses its structured reply, and manages a user's conversation threads.

pub mod context;
pub mod enrichment;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod session;
pub mod types;

pub use context::{ContextAggregator, KnowledgeSource};
pub use enrichment::{
    EnrichmentProvider, InnovationInsightsProvider, MarketDataProvider, StartupInsightsProvider,
    TechnologyTrendsProvider,
};
pub use error::{ChatError, ErrorKind};
pub use gateway::{GeminiGateway, ModelGateway};
pub use lifecycle::{ConversationManager, PendingTurn, ThreadState};
pub use orchestrator::{
    fallback_title, validate_input, ChatOrchestrator, MAX_MESSAGE_LENGTH, MAX_QUERY_LENGTH,
};
pub use parser::{DelimitedResponseParser, ParsedResponse, ResponseParser};
pub use session::{ChatSession, SessionSnapshot};
pub use types::{ChatReply, GenerationParams, Prompt};
