//! Component scores and their hybrid blend.
//!
//! Each candidate gets four signals — collaborative, content, popularity,
//! business — combined by a validated weight set. Collaborative and content
//! can be absent for sparse users/items; the engine degrades those cases to
//! popularity-only scoring rather than failing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::types::{ModelFeatures, RecReason};

/// Weights over the four component scores. Must sum to 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HybridWeights {
    pub collaborative: f64,
    pub content: f64,
    pub popularity: f64,
    pub business: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            collaborative: 0.4,
            content: 0.3,
            popularity: 0.2,
            business: 0.1,
        }
    }
}

impl HybridWeights {
    /// Alternate scoring profile served to the treatment arm: leans on
    /// embedding similarity instead of the factorization.
    pub fn content_forward() -> Self {
        Self {
            collaborative: 0.2,
            content: 0.5,
            popularity: 0.2,
            business: 0.1,
        }
    }

    /// Weights must be non-negative and sum to 1 (±1e-6).
    pub fn validate(&self) -> Result<()> {
        let parts = [self.collaborative, self.content, self.popularity, self.business];
        if parts.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::config("hybrid weights must be non-negative"));
        }
        let sum: f64 = parts.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(Error::config(format!(
                "hybrid weights must sum to 1, got {sum}"
            )));
        }
        Ok(())
    }
}

/// Popularity blend knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PopularityConfig {
    /// Usage count that maps to ~half of full usage credit
    pub usage_scale: f64,
    /// Recency half-life in days since catalog creation
    pub half_life_days: f64,
    pub usage_weight: f64,
    pub rating_weight: f64,
    pub recency_weight: f64,
}

impl Default for PopularityConfig {
    fn default() -> Self {
        Self {
            usage_scale: 1000.0,
            half_life_days: 30.0,
            usage_weight: 0.5,
            rating_weight: 0.3,
            recency_weight: 0.2,
        }
    }
}

/// Business-score knobs: monotonic bias toward margin (price) and quality
/// (performance).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BusinessConfig {
    pub margin_bias: f64,
    pub quality_bias: f64,
    /// Price that earns half of full margin credit
    pub price_scale: f64,
}

impl Default for BusinessConfig {
    fn default() -> Self {
        Self {
            margin_bias: 0.5,
            quality_bias: 0.5,
            price_scale: 200.0,
        }
    }
}

/// Component scores for one candidate.
#[derive(Debug, Clone, Copy)]
pub struct ScoreBreakdown {
    /// `None` when user or item is missing from the factorization
    pub collaborative: Option<f64>,
    pub content: f64,
    pub popularity: f64,
    pub business: f64,
}

impl ScoreBreakdown {
    /// Weighted hybrid score and the dominant (largest weighted) component.
    /// A missing collaborative signal contributes 0.
    pub fn hybrid(&self, weights: &HybridWeights) -> (f64, RecReason) {
        let parts = [
            (
                weights.collaborative * self.collaborative.unwrap_or(0.0),
                RecReason::Collaborative,
            ),
            (weights.content * self.content, RecReason::Content),
            (weights.popularity * self.popularity, RecReason::Popularity),
            (weights.business * self.business, RecReason::Business),
        ];
        let score = parts.iter().map(|(v, _)| v).sum();
        let reason = parts
            .iter()
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(_, r)| *r)
            .unwrap_or(RecReason::Popularity);
        (score, reason)
    }
}

/// Cosine similarity; 0 for mismatched lengths or zero vectors.
pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a < f64::EPSILON || norm_b < f64::EPSILON {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Collaborative affinity from cached factor vectors, squashed to (0, 1).
/// `None` when either side is missing from the latest snapshot.
pub fn collaborative_score(user_vec: Option<&[f64]>, item_vec: Option<&[f64]>) -> Option<f64> {
    let (u, v) = (user_vec?, item_vec?);
    if u.is_empty() || u.len() != v.len() {
        return None;
    }
    let dot: f64 = u.iter().zip(v).map(|(a, b)| a * b).sum();
    Some(sigmoid(dot))
}

/// Content similarity between a candidate's embedding and the mean embedding
/// of the user's history. 0 when either side has no embedding.
pub fn content_score(item_embedding: Option<&[f64]>, user_mean: Option<&[f64]>) -> f64 {
    match (item_embedding, user_mean) {
        (Some(item), Some(user)) => cosine(item, user),
        _ => 0.0,
    }
}

/// Popularity: log-scaled usage + normalized rating + exponential recency
/// decay since catalog creation.
pub fn popularity_score(
    features: &ModelFeatures,
    now: DateTime<Utc>,
    config: &PopularityConfig,
) -> f64 {
    let usage = (1.0 + features.usage_count as f64).ln() / (1.0 + config.usage_scale).ln();
    let rating = (features.average_rating / 5.0).clamp(0.0, 1.0);
    let age_days = ((now - features.created_at).num_seconds() as f64 / 86_400.0).max(0.0);
    let recency = (-age_days * std::f64::consts::LN_2 / config.half_life_days).exp();
    config.usage_weight * usage.min(1.0)
        + config.rating_weight * rating
        + config.recency_weight * recency
}

/// Business value: monotonic in both price (margin proxy) and performance.
pub fn business_score(features: &ModelFeatures, config: &BusinessConfig) -> f64 {
    let margin = features.price.max(0.0) / (features.price.max(0.0) + config.price_scale);
    let quality = features.performance.clamp(0.0, 1.0);
    config.margin_bias * margin + config.quality_bias * quality
}

/// Mean of a set of embedding vectors; `None` when empty or inconsistent.
pub fn mean_embedding(vectors: &[Vec<f64>]) -> Option<Vec<f64>> {
    let first = vectors.first()?;
    let dim = first.len();
    if dim == 0 || vectors.iter().any(|v| v.len() != dim) {
        return None;
    }
    let mut mean = vec![0.0; dim];
    for v in vectors {
        for (m, x) in mean.iter_mut().zip(v) {
            *m += x;
        }
    }
    for m in &mut mean {
        *m /= vectors.len() as f64;
    }
    Some(mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn item(usage: u64, rating: f64, age_days: i64, price: f64, performance: f64) -> ModelFeatures {
        ModelFeatures {
            id: "i".to_string(),
            category: "c".to_string(),
            tags: vec![],
            price,
            performance,
            usage_count: usage,
            average_rating: rating,
            created_at: Utc::now() - ChronoDuration::days(age_days),
        }
    }

    #[test]
    fn weights_validate_sum() {
        assert!(HybridWeights::default().validate().is_ok());
        assert!(HybridWeights::content_forward().validate().is_ok());
        let bad = HybridWeights {
            collaborative: 0.9,
            content: 0.3,
            popularity: 0.2,
            business: 0.1,
        };
        assert!(matches!(bad.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn cosine_handles_degenerate_inputs() {
        assert_eq!(cosine(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert!(cosine(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-12);
        assert_eq!(cosine(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn content_score_zero_when_missing() {
        assert_eq!(content_score(None, Some(&[1.0])), 0.0);
        assert_eq!(content_score(Some(&[1.0]), None), 0.0);
        assert!(content_score(Some(&[1.0, 1.0]), Some(&[1.0, 1.0])) > 0.99);
    }

    #[test]
    fn popularity_rewards_usage_rating_and_recency() {
        let config = PopularityConfig::default();
        let now = Utc::now();
        let popular = popularity_score(&item(5000, 4.8, 5, 50.0, 0.5), now, &config);
        let obscure = popularity_score(&item(3, 2.0, 400, 50.0, 0.5), now, &config);
        assert!(popular > obscure);

        // One half-life of age halves the recency term.
        let fresh = popularity_score(&item(0, 0.0, 0, 0.0, 0.0), now, &config);
        let aged = popularity_score(&item(0, 0.0, 30, 0.0, 0.0), now, &config);
        assert!((aged / fresh - 0.5).abs() < 0.02, "ratio {}", aged / fresh);
    }

    #[test]
    fn business_score_is_monotone() {
        let config = BusinessConfig::default();
        let cheap = business_score(&item(0, 0.0, 0, 50.0, 0.5), &config);
        let pricey = business_score(&item(0, 0.0, 0, 500.0, 0.5), &config);
        assert!(pricey > cheap);
        let performant = business_score(&item(0, 0.0, 0, 50.0, 0.9), &config);
        assert!(performant > cheap);
    }

    #[test]
    fn hybrid_picks_dominant_reason() {
        let breakdown = ScoreBreakdown {
            collaborative: Some(0.9),
            content: 0.1,
            popularity: 0.2,
            business: 0.1,
        };
        let (score, reason) = breakdown.hybrid(&HybridWeights::default());
        assert_eq!(reason, RecReason::Collaborative);
        assert!(score > 0.0);

        let sparse = ScoreBreakdown {
            collaborative: None,
            content: 0.0,
            popularity: 0.8,
            business: 0.2,
        };
        let (_, reason) = sparse.hybrid(&HybridWeights::default());
        assert_eq!(reason, RecReason::Popularity);
    }
}
