//! The recommendation service facade.
//!
//! Per call: gather the user's history (store + in-memory matrix), score
//! every non-history catalog item through the hybrid blend, diversity-rerank,
//! and truncate. Sparse users (no factor vector, no embeddable history)
//! degrade to popularity-only scoring with reduced confidence — silently,
//! never as an error.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::experiment::ExperimentArm;
use crate::providers::upstream::FallbackCache;
use crate::providers::{CatalogProvider, EmbeddingProvider, InteractionStore};
use crate::types::{ModelFeatures, RecReason, RecommendationResult, UserInteraction};

use super::diversity::{rerank, ScoredCandidate};
use super::matrix::{
    interaction_strength, FactorModel, FactorStore, InteractionMatrix, TrainConfig,
};
use super::scorer::{
    business_score, collaborative_score, content_score, mean_embedding, popularity_score,
    BusinessConfig, HybridWeights, PopularityConfig, ScoreBreakdown,
};

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct RecommendationConfig {
    /// Standard scoring weights (control arm)
    pub weights: HybridWeights,
    /// Alternate weights served to the treatment arm
    pub treatment_weights: HybridWeights,
    pub popularity: PopularityConfig,
    pub business: BusinessConfig,
    pub train: TrainConfig,
    /// Dwell-time threshold for the engaged-view strength bonus
    pub engaged_view_secs: f64,
    /// Step size for incremental user-profile nudges
    pub profile_nudge_rate: f64,
    /// Interaction strength that earns half of full user-data confidence
    pub user_data_scale: f64,
    /// Usage count that earns half of full item-data confidence
    pub item_usage_scale: f64,
    /// Result count for the experiment entry point
    pub default_count: usize,
    /// Diversity weight for the experiment entry point
    pub default_diversity_weight: f64,
    /// Deadline for each provider call
    pub provider_deadline: std::time::Duration,
    /// At most this many history items feed the mean embedding
    pub history_embedding_limit: usize,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            weights: HybridWeights::default(),
            treatment_weights: HybridWeights::content_forward(),
            popularity: PopularityConfig::default(),
            business: BusinessConfig::default(),
            train: TrainConfig::default(),
            engaged_view_secs: 60.0,
            profile_nudge_rate: 0.1,
            user_data_scale: 10.0,
            item_usage_scale: 50.0,
            default_count: 10,
            default_diversity_weight: 0.3,
            provider_deadline: std::time::Duration::from_millis(250),
            history_embedding_limit: 50,
        }
    }
}

impl RecommendationConfig {
    /// Both weight profiles must be consistent.
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        self.treatment_weights.validate()
    }
}

/// Hybrid recommender. One instance per deployment; the interaction matrix
/// is injected so tests and multi-engine setups never share hidden state.
pub struct RecommendationEngine {
    config: RecommendationConfig,
    catalog: Arc<dyn CatalogProvider>,
    embeddings: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn InteractionStore>,
    matrix: Arc<InteractionMatrix>,
    factors: FactorStore,
    catalog_cache: FallbackCache<Vec<ModelFeatures>>,
    history_cache: FallbackCache<Vec<String>>,
    embedding_cache: FallbackCache<Option<Vec<f64>>>,
}

impl RecommendationEngine {
    pub fn new(
        config: RecommendationConfig,
        catalog: Arc<dyn CatalogProvider>,
        embeddings: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn InteractionStore>,
        matrix: Arc<InteractionMatrix>,
    ) -> Result<Self> {
        config.validate()?;
        let deadline = config.provider_deadline;
        Ok(Self {
            config,
            catalog,
            embeddings,
            store,
            matrix,
            factors: FactorStore::new(),
            catalog_cache: FallbackCache::new("catalog.list_items", deadline),
            history_cache: FallbackCache::new("interaction_store.user_history", deadline),
            embedding_cache: FallbackCache::new("embedding.item", deadline),
        })
    }

    /// Ranked recommendations for `user_id`, excluding everything already in
    /// the user's interaction history.
    pub async fn get_recommendations(
        &self,
        user_id: &str,
        count: usize,
        diversity_weight: f64,
    ) -> Result<Vec<RecommendationResult>> {
        self.recommend_with_weights(user_id, count, diversity_weight, self.config.weights)
            .await
    }

    /// Experiment entry point: control gets the standard weights, treatment
    /// the alternate profile. Arm assignment belongs to the
    /// [`ExperimentRouter`](crate::experiment::ExperimentRouter).
    pub async fn get_recommendations_with_experiment(
        &self,
        user_id: &str,
        arm: ExperimentArm,
    ) -> Result<Vec<RecommendationResult>> {
        let weights = match arm {
            ExperimentArm::Control => self.config.weights,
            ExperimentArm::Treatment => self.config.treatment_weights,
        };
        self.recommend_with_weights(
            user_id,
            self.config.default_count,
            self.config.default_diversity_weight,
            weights,
        )
        .await
    }

    /// Record an interaction: durably append it, bump the matrix entry, and
    /// nudge the cached user profile. Effects are visible to the very next
    /// `get_recommendations` call; no retrain involved.
    pub async fn update_user_profile(&self, interaction: &UserInteraction) -> Result<()> {
        let strength = interaction_strength(interaction, self.config.engaged_view_secs);

        match tokio::time::timeout(
            self.config.provider_deadline,
            self.store.append_interaction(interaction),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(user_id = %interaction.user_id, error = %err, "interaction append failed; kept in memory only");
            }
            Err(_) => {
                warn!(user_id = %interaction.user_id, "interaction append timed out; kept in memory only");
            }
        }

        self.matrix
            .record(&interaction.user_id, &interaction.item_id, strength);
        self.factors.nudge_user(
            &interaction.user_id,
            &interaction.item_id,
            strength,
            self.config.profile_nudge_rate,
        );
        debug!(
            user_id = %interaction.user_id,
            item_id = %interaction.item_id,
            strength = %format!("{strength:.1}"),
            "user profile updated"
        );
        Ok(())
    }

    /// Offline job: merge the store's matrix snapshot, retrain the
    /// factorization, and publish it for the online path.
    pub async fn retrain(&self) -> Result<()> {
        match tokio::time::timeout(self.config.provider_deadline, self.store.matrix_snapshot())
            .await
        {
            Ok(Ok(snapshot)) => self.matrix.merge_snapshot(&snapshot),
            Ok(Err(err)) => warn!(error = %err, "matrix snapshot failed; training on local matrix"),
            Err(_) => warn!("matrix snapshot timed out; training on local matrix"),
        }

        let rows = self.matrix.rows();
        if rows.is_empty() {
            debug!("no interactions yet, skipping retrain");
            return Ok(());
        }
        let model = FactorModel::train(&rows, self.config.train);
        info!(
            users = model.user_factors.len(),
            items = model.item_factors.len(),
            "factor model published"
        );
        self.factors.publish(model);
        Ok(())
    }

    async fn recommend_with_weights(
        &self,
        user_id: &str,
        count: usize,
        diversity_weight: f64,
        weights: HybridWeights,
    ) -> Result<Vec<RecommendationResult>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let stored_history = self
            .history_cache
            .fetch(user_id, || self.store.user_history(user_id))
            .await
            .unwrap_or_default();
        let local_row = self.matrix.user_row(user_id);
        let mut history: HashSet<String> = stored_history.into_iter().collect();
        history.extend(local_row.keys().cloned());

        let items = self
            .catalog_cache
            .fetch("all", || self.catalog.list_items())
            .await
            .unwrap_or_default();
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let user_vec = self.factors.user_vec(user_id);
        let item_factors = self.factors.item_snapshot();
        let user_mean = self.user_mean_embedding(&history).await;
        // Store-only history still counts as user signal after a restart.
        let user_signal = self
            .matrix
            .user_total(user_id)
            .max(history.len() as f64);

        let sparse = user_vec.is_none() && user_mean.is_none();
        if sparse {
            debug!(user_id, "sparse interaction data, degrading to popularity scoring");
        }

        let now = Utc::now();
        let mut candidates = Vec::with_capacity(items.len());
        for features in &items {
            if history.contains(&features.id) {
                continue;
            }
            let (score, reason) = if sparse {
                (
                    popularity_score(features, now, &self.config.popularity),
                    RecReason::ColdStart,
                )
            } else {
                let collaborative = collaborative_score(
                    user_vec.as_deref(),
                    item_factors.get(&features.id).map(Vec::as_slice),
                );
                let item_embedding = self
                    .embedding_cache
                    .fetch(&features.id, || self.embeddings.embedding(&features.id))
                    .await
                    .unwrap_or(None);
                let breakdown = ScoreBreakdown {
                    collaborative,
                    content: content_score(item_embedding.as_deref(), user_mean.as_deref()),
                    popularity: popularity_score(features, now, &self.config.popularity),
                    business: business_score(features, &self.config.business),
                };
                breakdown.hybrid(&weights)
            };

            candidates.push(ScoredCandidate {
                result: RecommendationResult {
                    item_id: features.id.clone(),
                    score,
                    reason,
                    confidence: self.confidence(user_signal, features.usage_count),
                },
                category: features.category.clone(),
            });
        }

        // Stable sort keeps catalog order for exact ties.
        candidates.sort_by(|a, b| {
            b.result
                .score
                .partial_cmp(&a.result.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut ranked = rerank(candidates, diversity_weight);
        ranked.truncate(count);
        Ok(ranked)
    }

    /// Mean embedding of the user's history items, `None` when nothing in
    /// the history has an embedding.
    async fn user_mean_embedding(&self, history: &HashSet<String>) -> Option<Vec<f64>> {
        let mut vectors = Vec::new();
        for item_id in history.iter().take(self.config.history_embedding_limit) {
            let embedding = self
                .embedding_cache
                .fetch(item_id, || self.embeddings.embedding(item_id))
                .await
                .unwrap_or(None);
            if let Some(v) = embedding {
                vectors.push(v);
            }
        }
        mean_embedding(&vectors)
    }

    /// Blend of user-data and item-data coverage, each saturating strictly
    /// below 1, so a cold-start user can never reach confidence 0.5.
    fn confidence(&self, user_signal: f64, item_usage: u64) -> f64 {
        let user_cap = user_signal / (user_signal + self.config.user_data_scale);
        let usage = item_usage as f64;
        let item_cap = usage / (usage + self.config.item_usage_scale);
        0.5 * user_cap + 0.5 * item_cap
    }
}
