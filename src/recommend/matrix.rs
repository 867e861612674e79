//! Interaction matrix and latent factor profiles.
//!
//! The sparse user → item → strength matrix grows monotonically through
//! incremental updates on the online path. A low-rank factorization of it is
//! batch-trained off the hot path ([`FactorModel::train`]) and published into
//! a [`FactorStore`] snapshot; `update_user_profile` nudges the cached user
//! vector in place so fresh interactions influence the very next call
//! without a retrain.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::types::UserInteraction;

/// Aggregated strength of one interaction event.
///
/// purchased(+5) + explicit rating (when present) + viewed(+1) + engaged-view
/// bonus(+2) when dwell time exceeds `engaged_view_secs`. Always ≥ 0.
pub fn interaction_strength(event: &UserInteraction, engaged_view_secs: f64) -> f64 {
    let mut strength = 0.0;
    if event.purchased {
        strength += 5.0;
    }
    if let Some(rating) = event.rating {
        strength += rating.clamp(0.0, 5.0);
    }
    if event.viewed {
        strength += 1.0;
    }
    if event.time_spent_secs > engaged_view_secs {
        strength += 2.0;
    }
    strength
}

const SHARD_COUNT: usize = 16;

fn user_shard(user_id: &str) -> usize {
    let mut hasher = DefaultHasher::new();
    user_id.hash(&mut hasher);
    (hasher.finish() % SHARD_COUNT as u64) as usize
}

/// Sparse user → item → strength matrix.
///
/// Lock discipline mirrors the Q-table: one `RwLock` per shard keyed by
/// user id, so concurrent updates for different users proceed in parallel
/// and updates for the same user serialize. Strengths only ever grow.
#[derive(Debug)]
pub struct InteractionMatrix {
    shards: Vec<RwLock<HashMap<String, HashMap<String, f64>>>>,
}

impl Default for InteractionMatrix {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionMatrix {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| RwLock::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, user_id: &str) -> &RwLock<HashMap<String, HashMap<String, f64>>> {
        &self.shards[user_shard(user_id)]
    }

    /// Add `strength` to the (user, item) entry.
    pub fn record(&self, user_id: &str, item_id: &str, strength: f64) {
        let mut shard = self.shard(user_id).write().unwrap_or_else(|p| p.into_inner());
        let entry = shard
            .entry(user_id.to_string())
            .or_default()
            .entry(item_id.to_string())
            .or_insert(0.0);
        *entry = (*entry + strength).max(0.0);
    }

    /// Copy of one user's row.
    pub fn user_row(&self, user_id: &str) -> HashMap<String, f64> {
        self.shard(user_id)
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Total interaction strength for a user (confidence input).
    pub fn user_total(&self, user_id: &str) -> f64 {
        self.user_row(user_id).values().sum()
    }

    /// Copy of the whole matrix, for offline retraining.
    pub fn rows(&self) -> HashMap<String, HashMap<String, f64>> {
        let mut out = HashMap::new();
        for shard in &self.shards {
            for (user, row) in shard.read().unwrap_or_else(|p| p.into_inner()).iter() {
                out.insert(user.clone(), row.clone());
            }
        }
        out
    }

    /// Merge an external snapshot (e.g. from the interaction store),
    /// keeping the larger strength where both sides have an entry.
    pub fn merge_snapshot(&self, snapshot: &HashMap<String, HashMap<String, f64>>) {
        for (user, row) in snapshot {
            let mut shard = self.shard(user).write().unwrap_or_else(|p| p.into_inner());
            let target = shard.entry(user.clone()).or_default();
            for (item, strength) in row {
                let entry = target.entry(item.clone()).or_insert(0.0);
                *entry = entry.max(*strength);
            }
        }
    }
}

/// Batch-training hyperparameters for the factorization.
#[derive(Debug, Clone, Copy)]
pub struct TrainConfig {
    /// Latent dimensionality
    pub rank: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub regularization: f64,
    /// Seed for factor initialization; training is deterministic given it
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            rank: 16,
            epochs: 30,
            learning_rate: 0.05,
            regularization: 0.02,
            seed: 42,
        }
    }
}

/// A trained low-rank factorization snapshot.
#[derive(Debug, Clone, Default)]
pub struct FactorModel {
    pub rank: usize,
    pub user_factors: HashMap<String, Vec<f64>>,
    pub item_factors: HashMap<String, Vec<f64>>,
}

impl FactorModel {
    /// SGD matrix factorization over observed strengths.
    ///
    /// Minimizes Σ (strength − uᵀv)² + λ(‖u‖² + ‖v‖²) over the observed
    /// entries only. Runs as an offline job; the online path never calls
    /// this.
    pub fn train(rows: &HashMap<String, HashMap<String, f64>>, config: TrainConfig) -> Self {
        let mut rng = SmallRng::seed_from_u64(config.seed);
        let init = |rng: &mut SmallRng| -> Vec<f64> {
            (0..config.rank).map(|_| rng.gen_range(-0.1..0.1)).collect()
        };

        let mut user_factors: HashMap<String, Vec<f64>> = HashMap::new();
        let mut item_factors: HashMap<String, Vec<f64>> = HashMap::new();

        // Deterministic iteration order for reproducible training.
        let mut users: Vec<&String> = rows.keys().collect();
        users.sort();
        for user in &users {
            user_factors.insert((*user).clone(), init(&mut rng));
            let mut items: Vec<&String> = rows[*user].keys().collect();
            items.sort();
            for item in items {
                item_factors
                    .entry(item.clone())
                    .or_insert_with(|| init(&mut rng));
            }
        }

        for _ in 0..config.epochs {
            for user in &users {
                let mut items: Vec<(&String, &f64)> = rows[*user].iter().collect();
                items.sort_by_key(|(item, _)| item.as_str());
                for (item, strength) in items {
                    // Work on copies so the borrow of both maps is clean.
                    let u = user_factors[*user].clone();
                    let v = item_factors[item].clone();
                    let pred: f64 = u.iter().zip(&v).map(|(a, b)| a * b).sum();
                    let err = strength - pred;
                    let u_next = user_factors.get_mut(*user).unwrap();
                    for k in 0..config.rank {
                        u_next[k] += config.learning_rate
                            * (err * v[k] - config.regularization * u[k]);
                    }
                    let v_next = item_factors.get_mut(item).unwrap();
                    for k in 0..config.rank {
                        v_next[k] += config.learning_rate
                            * (err * u[k] - config.regularization * v[k]);
                    }
                }
            }
        }

        debug!(
            users = user_factors.len(),
            items = item_factors.len(),
            rank = config.rank,
            "factor model trained"
        );
        Self {
            rank: config.rank,
            user_factors,
            item_factors,
        }
    }

    /// Predicted affinity of `user` for `item`, when both sides are known.
    pub fn predict(&self, user_id: &str, item_id: &str) -> Option<f64> {
        let u = self.user_factors.get(user_id)?;
        let v = self.item_factors.get(item_id)?;
        Some(u.iter().zip(v).map(|(a, b)| a * b).sum())
    }
}

/// Published factor snapshot read by the online path.
///
/// Item factors are immutable between retrains and shared via `Arc`; user
/// factors take incremental nudges from `update_user_profile`, guarded by a
/// single `RwLock` (per-user writes are short and rare relative to reads).
#[derive(Debug, Default)]
pub struct FactorStore {
    users: RwLock<HashMap<String, Vec<f64>>>,
    items: RwLock<Arc<HashMap<String, Vec<f64>>>>,
}

impl FactorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a freshly trained model.
    pub fn publish(&self, model: FactorModel) {
        *self.users.write().unwrap_or_else(|p| p.into_inner()) = model.user_factors;
        *self.items.write().unwrap_or_else(|p| p.into_inner()) = Arc::new(model.item_factors);
    }

    /// Latest cached user profile vector.
    pub fn user_vec(&self, user_id: &str) -> Option<Vec<f64>> {
        self.users
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(user_id)
            .cloned()
    }

    /// Item factor snapshot (cheap `Arc` clone).
    pub fn item_snapshot(&self) -> Arc<HashMap<String, Vec<f64>>> {
        Arc::clone(&self.items.read().unwrap_or_else(|p| p.into_inner()))
    }

    /// Nudge the user's cached profile toward the item's factor direction:
    /// `u += rate · strength · v`. No retrain; visible to the next read.
    pub fn nudge_user(&self, user_id: &str, item_id: &str, strength: f64, rate: f64) {
        let items = self.item_snapshot();
        let Some(v) = items.get(item_id) else {
            return; // Item unseen by the last retrain; nothing to nudge along.
        };
        let rank = v.len();
        let mut users = self.users.write().unwrap_or_else(|p| p.into_inner());
        let u = users
            .entry(user_id.to_string())
            .or_insert_with(|| vec![0.0; rank]);
        for k in 0..rank.min(u.len()) {
            u[k] += rate * strength * v[k];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn strength_components_accumulate() {
        let mut event = UserInteraction::purchase("u", "i", Utc::now());
        event.rating = Some(4.0);
        event.time_spent_secs = 120.0;
        // purchase 5 + rating 4 + viewed 1 + engaged 2
        assert!((interaction_strength(&event, 60.0) - 12.0).abs() < 1e-12);

        let view = UserInteraction::view("u", "i", Utc::now());
        assert!((interaction_strength(&view, 60.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn matrix_accumulates_and_stays_non_negative() {
        let matrix = InteractionMatrix::new();
        matrix.record("u1", "a", 1.0);
        matrix.record("u1", "a", 5.0);
        matrix.record("u1", "b", 2.0);
        let row = matrix.user_row("u1");
        assert!((row["a"] - 6.0).abs() < 1e-12);
        assert!((matrix.user_total("u1") - 8.0).abs() < 1e-12);
        assert!(matrix.user_row("ghost").is_empty());
    }

    #[test]
    fn training_fits_observed_preferences() {
        // Two users with opposite tastes over two items.
        let mut rows: HashMap<String, HashMap<String, f64>> = HashMap::new();
        rows.entry("u1".into())
            .or_default()
            .extend([("a".to_string(), 8.0), ("b".to_string(), 1.0)]);
        rows.entry("u2".into())
            .or_default()
            .extend([("a".to_string(), 1.0), ("b".to_string(), 8.0)]);

        let model = FactorModel::train(&rows, TrainConfig { rank: 4, epochs: 200, ..TrainConfig::default() });
        let u1_a = model.predict("u1", "a").unwrap();
        let u1_b = model.predict("u1", "b").unwrap();
        let u2_b = model.predict("u2", "b").unwrap();
        assert!(u1_a > u1_b, "u1 prefers a: {u1_a} vs {u1_b}");
        assert!(u2_b > model.predict("u2", "a").unwrap());
        assert_eq!(model.predict("u3", "a"), None);
    }

    #[test]
    fn nudge_is_immediately_visible() {
        let store = FactorStore::new();
        let mut model = FactorModel {
            rank: 2,
            user_factors: HashMap::new(),
            item_factors: HashMap::new(),
        };
        model.item_factors.insert("a".to_string(), vec![1.0, 0.0]);
        store.publish(model);

        assert_eq!(store.user_vec("u1"), None);
        store.nudge_user("u1", "a", 5.0, 0.1);
        let u = store.user_vec("u1").unwrap();
        assert!((u[0] - 0.5).abs() < 1e-12);
        assert_eq!(u[1], 0.0);
    }
}
