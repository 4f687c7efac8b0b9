//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use guru_chat::{ChatOrchestrator, ContextAggregator, GenerationParams, ModelGateway};
use guru_core::config::GuruConfig;
use guru_storage::{Database, KnowledgeRepository};

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks. Services are
/// immutable once built; the database serializes access internally.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GuruConfig>,
    pub knowledge: Arc<KnowledgeRepository>,
    pub aggregator: Arc<ContextAggregator>,
    pub orchestrator: Arc<ChatOrchestrator>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Wire the pipeline over `database` and `gateway`.
    pub fn new(config: GuruConfig, database: Arc<Database>, gateway: Arc<dyn ModelGateway>) -> Self {
        let knowledge = Arc::new(KnowledgeRepository::new(database));
        let aggregator = ContextAggregator::from_config(knowledge.clone(), &config);
        let orchestrator =
            ChatOrchestrator::new(gateway).with_params(GenerationParams::from(&config.model));

        Self {
            config: Arc::new(config),
            knowledge,
            aggregator: Arc::new(aggregator),
            orchestrator: Arc::new(orchestrator),
            start_time: Instant::now(),
        }
    }
}
