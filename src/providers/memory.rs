//! In-process provider implementations.
//!
//! These back the engines in tests and in single-node deployments where the
//! catalog and interaction log fit in memory. They are also the reference
//! semantics for what a real (database/service) implementation must return.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::errors::Result;
use crate::recommend::interaction_strength;
use crate::types::{ModelFeatures, UserInteraction};

use super::{
    CatalogProvider, EmbeddingProvider, ExternalFactors, InteractionStore, MarketDataProvider,
};

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|p| p.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|p| p.into_inner())
}

/// In-memory market data keyed by product id.
#[derive(Debug, Default)]
pub struct MemoryMarketData {
    competitor_prices: RwLock<HashMap<String, Vec<f64>>>,
    demand_series: RwLock<HashMap<String, Vec<f64>>>,
    factors: RwLock<HashMap<String, ExternalFactors>>,
}

impl MemoryMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_competitor_prices(&self, product_id: &str, prices: Vec<f64>) {
        write(&self.competitor_prices).insert(product_id.to_string(), prices);
    }

    pub fn set_demand_series(&self, product_id: &str, series: Vec<f64>) {
        write(&self.demand_series).insert(product_id.to_string(), series);
    }

    pub fn set_factors(&self, product_id: &str, factors: ExternalFactors) {
        write(&self.factors).insert(product_id.to_string(), factors);
    }
}

#[async_trait]
impl MarketDataProvider for MemoryMarketData {
    async fn competitor_prices(&self, product_id: &str) -> Result<Vec<f64>> {
        Ok(read(&self.competitor_prices)
            .get(product_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn historical_demand(&self, product_id: &str) -> Result<Vec<f64>> {
        Ok(read(&self.demand_series)
            .get(product_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn external_factors(&self, product_id: &str) -> Result<ExternalFactors> {
        Ok(read(&self.factors)
            .get(product_id)
            .copied()
            .unwrap_or_default())
    }
}

/// In-memory catalog.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    items: RwLock<HashMap<String, ModelFeatures>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, features: ModelFeatures) {
        write(&self.items).insert(features.id.clone(), features);
    }
}

#[async_trait]
impl CatalogProvider for MemoryCatalog {
    async fn item_features(&self, item_id: &str) -> Result<Option<ModelFeatures>> {
        Ok(read(&self.items).get(item_id).cloned())
    }

    async fn list_items(&self) -> Result<Vec<ModelFeatures>> {
        let mut items: Vec<ModelFeatures> = read(&self.items).values().cloned().collect();
        // Stable candidate order regardless of map iteration order.
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }
}

/// In-memory append-only interaction log with an aggregated strength matrix.
#[derive(Debug)]
pub struct MemoryInteractionStore {
    events: RwLock<Vec<UserInteraction>>,
    matrix: RwLock<HashMap<String, HashMap<String, f64>>>,
    engaged_view_secs: f64,
}

impl MemoryInteractionStore {
    /// `engaged_view_secs` is the dwell-time threshold for the engaged-view
    /// bonus when aggregating strengths; keep it equal to the engine config.
    pub fn new(engaged_view_secs: f64) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            matrix: RwLock::new(HashMap::new()),
            engaged_view_secs,
        }
    }

    /// Number of appended events.
    pub fn len(&self) -> usize {
        read(&self.events).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryInteractionStore {
    fn default() -> Self {
        Self::new(60.0)
    }
}

#[async_trait]
impl InteractionStore for MemoryInteractionStore {
    async fn append_interaction(&self, event: &UserInteraction) -> Result<()> {
        let strength = interaction_strength(event, self.engaged_view_secs);
        write(&self.events).push(event.clone());
        let mut matrix = write(&self.matrix);
        *matrix
            .entry(event.user_id.clone())
            .or_default()
            .entry(event.item_id.clone())
            .or_insert(0.0) += strength;
        Ok(())
    }

    async fn user_history(&self, user_id: &str) -> Result<Vec<String>> {
        Ok(read(&self.matrix)
            .get(user_id)
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn matrix_snapshot(&self) -> Result<HashMap<String, HashMap<String, f64>>> {
        Ok(read(&self.matrix).clone())
    }
}

/// In-memory embedding lookup.
#[derive(Debug, Default)]
pub struct MemoryEmbeddings {
    vectors: RwLock<HashMap<String, Vec<f64>>>,
}

impl MemoryEmbeddings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, item_id: &str, vector: Vec<f64>) {
        write(&self.vectors).insert(item_id.to_string(), vector);
    }
}

#[async_trait]
impl EmbeddingProvider for MemoryEmbeddings {
    async fn embedding(&self, item_id: &str) -> Result<Option<Vec<f64>>> {
        Ok(read(&self.vectors).get(item_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn interaction_store_aggregates_strength() {
        let store = MemoryInteractionStore::new(60.0);
        let mut event = UserInteraction::view("u1", "item-a", Utc::now());
        event.time_spent_secs = 90.0;
        store.append_interaction(&event).await.unwrap();
        store
            .append_interaction(&UserInteraction::purchase("u1", "item-a", Utc::now()))
            .await
            .unwrap();

        let matrix = store.matrix_snapshot().await.unwrap();
        let strength = matrix["u1"]["item-a"];
        // engaged view (1 + 2) + purchase (5 + 1 viewed)
        assert!((strength - 9.0).abs() < 1e-12, "got {strength}");
        assert_eq!(store.user_history("u1").await.unwrap(), vec!["item-a"]);
    }
}
