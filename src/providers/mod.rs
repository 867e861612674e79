//! Abstract collaborator interfaces consumed by both engines.
//!
//! The storefront supplies real implementations backed by its catalog,
//! market-data feed, event store, and embedding service. [`memory`] ships
//! in-process implementations used by tests and by single-node deployments.
//! All calls through these traits are treated as cancellable, deadline-bound
//! operations; [`upstream::FallbackCache`] wraps them with a timeout and a
//! last-known-good cache so a slow provider degrades the result instead of
//! blocking or failing the caller.

pub mod memory;
pub mod upstream;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::types::{ModelFeatures, UserInteraction};

/// Slow-moving market factors for one product, fetched per pricing call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExternalFactors {
    /// Seasonal demand multiplier, 1.0 = neutral
    pub seasonal_factor: f64,
    /// Units currently in stock
    pub inventory_level: f64,
    /// Observed view→purchase conversion rate in [0, 1]
    pub conversion_rate: f64,
    /// Own-price elasticity of demand (typically negative)
    pub price_elasticity: f64,
}

impl Default for ExternalFactors {
    fn default() -> Self {
        Self {
            seasonal_factor: 1.0,
            inventory_level: 0.0,
            conversion_rate: 0.0,
            price_elasticity: -1.0,
        }
    }
}

/// Competitor prices, historical demand, and external market factors.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Known competitor prices for a product. Empty when untracked.
    async fn competitor_prices(&self, product_id: &str) -> Result<Vec<f64>>;

    /// Daily demand series (units sold per day), oldest first.
    async fn historical_demand(&self, product_id: &str) -> Result<Vec<f64>>;

    /// Current external market factors.
    async fn external_factors(&self, product_id: &str) -> Result<ExternalFactors>;
}

/// Item feature lookup against the catalog.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Features for one item. `None` for unknown ids.
    async fn item_features(&self, item_id: &str) -> Result<Option<ModelFeatures>>;

    /// The full candidate set for recommendations.
    async fn list_items(&self) -> Result<Vec<ModelFeatures>>;
}

/// Append-only store of user/item interaction events.
#[async_trait]
pub trait InteractionStore: Send + Sync {
    /// Durably append one event.
    async fn append_interaction(&self, event: &UserInteraction) -> Result<()>;

    /// Item ids the user has interacted with, unordered.
    async fn user_history(&self, user_id: &str) -> Result<Vec<String>>;

    /// Full sparse user → item → strength snapshot, for offline retraining.
    async fn matrix_snapshot(
        &self,
    ) -> Result<std::collections::HashMap<String, std::collections::HashMap<String, f64>>>;
}

/// Per-item feature vectors computed by an external provider.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embedding for one item, `None` when not (yet) computed.
    async fn embedding(&self, item_id: &str) -> Result<Option<Vec<f64>>>;
}
