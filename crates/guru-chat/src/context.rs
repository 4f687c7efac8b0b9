//! Business context aggregation.
//!
//! Combines the knowledge store and every enrichment provider into one
//! [`BusinessContext`]. Each source sits behind its own failure boundary, so
//! aggregation itself never fails.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use guru_core::config::GuruConfig;
use guru_core::types::{BusinessContext, KnowledgeSnippet, Snapshot};
use guru_storage::KnowledgeRepository;

use crate::enrichment::{
    EnrichmentProvider, InnovationInsightsProvider, MarketDataProvider, StartupInsightsProvider,
    TechnologyTrendsProvider,
};
use crate::error::ChatError;

// =============================================================================
// KnowledgeSource
// =============================================================================

/// Read access to ranked knowledge snippets.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// Up to `limit` snippets, most relevant first.
    async fn top_snippets(&self, limit: usize) -> Result<Vec<KnowledgeSnippet>, ChatError>;
}

#[async_trait]
impl KnowledgeSource for KnowledgeRepository {
    async fn top_snippets(&self, limit: usize) -> Result<Vec<KnowledgeSnippet>, ChatError> {
        Ok(self.top_by_relevance(limit)?)
    }
}

// =============================================================================
// ContextAggregator
// =============================================================================

/// Builds a fresh [`BusinessContext`] per query.
pub struct ContextAggregator {
    knowledge: Arc<dyn KnowledgeSource>,
    market: Arc<dyn EnrichmentProvider>,
    startup: Arc<dyn EnrichmentProvider>,
    technology: Arc<dyn EnrichmentProvider>,
    innovation: Arc<dyn EnrichmentProvider>,
    top_k: usize,
}

impl ContextAggregator {
    pub fn new(
        knowledge: Arc<dyn KnowledgeSource>,
        market: Arc<dyn EnrichmentProvider>,
        startup: Arc<dyn EnrichmentProvider>,
        technology: Arc<dyn EnrichmentProvider>,
        innovation: Arc<dyn EnrichmentProvider>,
    ) -> Self {
        Self {
            knowledge,
            market,
            startup,
            technology,
            innovation,
            top_k: 5,
        }
    }

    /// Aggregator over the built-in providers.
    pub fn from_config(knowledge: Arc<dyn KnowledgeSource>, config: &GuruConfig) -> Self {
        Self::new(
            knowledge,
            Arc::new(MarketDataProvider::new(
                config.enrichment.market_data_api_key.clone(),
            )),
            Arc::new(StartupInsightsProvider),
            Arc::new(TechnologyTrendsProvider),
            Arc::new(InnovationInsightsProvider),
        )
        .with_top_k(config.knowledge.top_k)
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Gather context for `query`.
    ///
    /// All sources run concurrently and are awaited together; a failing
    /// source contributes an empty value and never affects the others.
    pub async fn aggregate(&self, query: &str) -> BusinessContext {
        let (knowledge_base, market_data, startup_insights, technology_trends, innovation_insights) = tokio::join!(
            self.fetch_knowledge(),
            guarded(self.market.as_ref()),
            guarded(self.startup.as_ref()),
            guarded(self.technology.as_ref()),
            guarded(self.innovation.as_ref()),
        );

        debug!(
            query_len = query.chars().count(),
            snippets = knowledge_base.len(),
            "business context aggregated"
        );

        BusinessContext {
            market_data,
            startup_insights,
            technology_trends,
            innovation_insights,
            knowledge_base,
        }
    }

    async fn fetch_knowledge(&self) -> Vec<KnowledgeSnippet> {
        match self.knowledge.top_snippets(self.top_k).await {
            Ok(mut snippets) => {
                snippets.truncate(self.top_k);
                snippets
            }
            Err(e) => {
                warn!(error = %e, "knowledge store unavailable, continuing without it");
                Vec::new()
            }
        }
    }
}

async fn guarded(provider: &dyn EnrichmentProvider) -> Snapshot {
    match provider.fetch().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(provider = provider.name(), error = %e, "enrichment provider failed");
            Snapshot::new()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
