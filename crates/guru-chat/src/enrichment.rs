//! Enrichment providers.
//!
//! Each provider exposes one "fetch current snapshot" operation. Providers
//! are best-effort: the aggregator absorbs their failures.

use async_trait::async_trait;
use serde_json::{json, Value};

use guru_core::types::Snapshot;

use crate::error::ChatError;

/// A single source of business context.
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Fetch the provider's current snapshot.
    async fn fetch(&self) -> Result<Snapshot, ChatError>;
}

fn snapshot(value: Value) -> Snapshot {
    match value {
        Value::Object(map) => map,
        _ => Snapshot::new(),
    }
}

/// Market trends and sizing. Yields nothing unless a market data key is set.
pub struct MarketDataProvider {
    api_key: Option<String>,
}

impl MarketDataProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self { api_key }
    }
}

#[async_trait]
impl EnrichmentProvider for MarketDataProvider {
    fn name(&self) -> &'static str {
        "market_data"
    }

    async fn fetch(&self) -> Result<Snapshot, ChatError> {
        if self.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Ok(Snapshot::new());
        }
        Ok(snapshot(json!({
            "marketTrends": "AI and Machine Learning continue to drive market growth",
            "industryMetrics": "Tech sector showing 15% YoY growth",
            "marketSize": "Global AI market expected to reach $1.5T by 2030"
        })))
    }
}

/// Startup ecosystem funding and success metrics.
pub struct StartupInsightsProvider;

#[async_trait]
impl EnrichmentProvider for StartupInsightsProvider {
    fn name(&self) -> &'static str {
        "startup_insights"
    }

    async fn fetch(&self) -> Result<Snapshot, ChatError> {
        Ok(snapshot(json!({
            "fundingTrends": "AI startups raised $45B in 2023",
            "successMetrics": "Average time to Series A: 18 months",
            "marketOpportunities": "Enterprise AI solutions showing strong growth"
        })))
    }
}

/// Emerging technology and adoption rates.
pub struct TechnologyTrendsProvider;

#[async_trait]
impl EnrichmentProvider for TechnologyTrendsProvider {
    fn name(&self) -> &'static str {
        "technology_trends"
    }

    async fn fetch(&self) -> Result<Snapshot, ChatError> {
        Ok(snapshot(json!({
            "emergingTech": ["AI/ML", "Quantum Computing", "Edge Computing"],
            "adoptionRates": "Enterprise AI adoption up 35% YoY",
            "innovationAreas": "Sustainable Tech, HealthTech, FinTech"
        })))
    }
}

/// Breakthrough areas and R&D signals.
pub struct InnovationInsightsProvider;

#[async_trait]
impl EnrichmentProvider for InnovationInsightsProvider {
    fn name(&self) -> &'static str {
        "innovation_insights"
    }

    async fn fetch(&self) -> Result<Snapshot, ChatError> {
        Ok(snapshot(json!({
            "breakthroughAreas": ["AI-driven automation", "Sustainable solutions"],
            "innovationMetrics": "R&D spending up 20% in tech sector",
            "futureTrends": "Convergence of AI, IoT, and Blockchain"
        })))
    }
}
