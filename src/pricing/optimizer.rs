//! Epsilon-greedy Q-learning price optimizer.
//!
//! Frames repricing as a tabular MDP: the continuous market snapshot is
//! discretized into a [`StateKey`](super::state::StateKey) row, the agent
//! picks one of five discrete [`PriceAction`] multipliers, the constraint
//! enforcer clamps the proposal, the reward calculator scores the clamped
//! price, and the Q-value for the visited (state, action) pair is updated:
//!
//! ```text
//! Q[s,a] += α (r + γ·maxₐ Q[s',·] − Q[s,a])
//! ```
//!
//! The successor s' is the state re-encoded after applying the new price
//! with an elasticity-shifted demand response (see `PricingState::successor`)
//! — the discount term bootstraps from a real row, not a constant.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{Error, Result};
use crate::experiment::PricingGroup;
use crate::providers::{CatalogProvider, MarketDataProvider};
use crate::types::{PriceDecision, UserTier};

use super::constraints::{enforce, ClampOutcome, PricingConstraints};
use super::reward::{RewardCalculator, RewardWeights};
use super::state::PricingStateBuilder;

/// Discrete price-adjustment action. Tagged variants, never a bare index,
/// so adding or reordering actions cannot silently shift multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceAction {
    /// ×0.8
    DeepDiscount,
    /// ×0.9
    Discount,
    /// ×1.0
    Hold,
    /// ×1.1
    Raise,
    /// ×1.2
    Surge,
}

impl PriceAction {
    /// Price multiplier for this action.
    pub fn multiplier(&self) -> f64 {
        match self {
            Self::DeepDiscount => 0.8,
            Self::Discount => 0.9,
            Self::Hold => 1.0,
            Self::Raise => 1.1,
            Self::Surge => 1.2,
        }
    }

    /// Get action index (0-4).
    pub fn index(&self) -> usize {
        match self {
            Self::DeepDiscount => 0,
            Self::Discount => 1,
            Self::Hold => 2,
            Self::Raise => 3,
            Self::Surge => 4,
        }
    }

    /// Create from index.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::DeepDiscount,
            1 => Self::Discount,
            2 => Self::Hold,
            3 => Self::Raise,
            _ => Self::Surge,
        }
    }

    /// Number of actions.
    pub const COUNT: usize = 5;

    /// All actions in index order.
    pub const ALL: [PriceAction; Self::COUNT] = [
        Self::DeepDiscount,
        Self::Discount,
        Self::Hold,
        Self::Raise,
        Self::Surge,
    ];

    /// Short label for logs and reasoning strings.
    pub fn label(&self) -> &'static str {
        match self {
            Self::DeepDiscount => "deep discount (x0.8)",
            Self::Discount => "discount (x0.9)",
            Self::Hold => "hold (x1.0)",
            Self::Raise => "raise (x1.1)",
            Self::Surge => "surge (x1.2)",
        }
    }

    /// Distance of this action's multiplier from no-change.
    fn deviation(&self) -> f64 {
        (self.multiplier() - 1.0).abs()
    }
}

/// Greedy action for a Q-row: highest value, ties broken toward the smallest
/// price change (then lowest index), so a fresh all-zero row holds price.
fn greedy_action(row: &[f64; PriceAction::COUNT]) -> PriceAction {
    let mut best = 0usize;
    for i in 1..PriceAction::COUNT {
        if row[i] > row[best] {
            best = i;
        } else if row[i] == row[best]
            && PriceAction::from_index(i).deviation() < PriceAction::from_index(best).deviation()
        {
            best = i;
        }
    }
    PriceAction::from_index(best)
}

/// One persisted Q-table row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QTableEntry {
    pub state: u64,
    pub values: [f64; PriceAction::COUNT],
}

const SHARD_COUNT: usize = 16;

/// Learned state-action values, sharded by state key.
///
/// Lock discipline: one `RwLock` per shard, a state key always maps to the
/// same shard, and every write takes exactly one shard write lock — so
/// concurrent writes to different keys proceed in parallel while writes to
/// the same key serialize (no update loss). Explicitly injected into the
/// optimizer; never a module-level singleton.
#[derive(Debug, Default)]
pub struct QTable {
    shards: Vec<RwLock<HashMap<u64, [f64; PriceAction::COUNT]>>>,
}

impl QTable {
    /// Empty table.
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| RwLock::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, key: u64) -> &RwLock<HashMap<u64, [f64; PriceAction::COUNT]>> {
        &self.shards[(key % SHARD_COUNT as u64) as usize]
    }

    /// Copy of a row, `None` for never-visited states.
    pub fn row(&self, key: u64) -> Option<[f64; PriceAction::COUNT]> {
        self.shard(key)
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(&key)
            .copied()
    }

    /// Best known value for a state, 0 for unseen states.
    pub fn max_q(&self, key: u64) -> f64 {
        self.row(key)
            .map(|row| row.iter().copied().fold(f64::NEG_INFINITY, f64::max))
            .unwrap_or(0.0)
    }

    /// Apply the Q-learning update for one (state, action) pair and return
    /// the new value.
    pub fn update(
        &self,
        key: u64,
        action: PriceAction,
        reward: f64,
        future_value: f64,
        learning_rate: f64,
        discount: f64,
    ) -> f64 {
        let mut shard = self.shard(key).write().unwrap_or_else(|p| p.into_inner());
        let row = shard.entry(key).or_insert([0.0; PriceAction::COUNT]);
        let q = &mut row[action.index()];
        *q += learning_rate * (reward + discount * future_value - *q);
        *q
    }

    /// Number of distinct states visited.
    pub fn states_visited(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.read().unwrap_or_else(|p| p.into_inner()).len())
            .sum()
    }

    /// Drop all learned values. The only way learned state is ever deleted.
    pub fn reset(&self) {
        for shard in &self.shards {
            shard.write().unwrap_or_else(|p| p.into_inner()).clear();
        }
    }

    /// Export every row for checkpointing.
    pub fn snapshot(&self) -> Vec<QTableEntry> {
        let mut entries: Vec<QTableEntry> = self
            .shards
            .iter()
            .flat_map(|s| {
                s.read()
                    .unwrap_or_else(|p| p.into_inner())
                    .iter()
                    .map(|(state, values)| QTableEntry {
                        state: *state,
                        values: *values,
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        entries.sort_by_key(|e| e.state);
        entries
    }

    /// Restore rows from a checkpoint, replacing current contents.
    pub fn restore(&self, entries: &[QTableEntry]) {
        self.reset();
        for entry in entries {
            let mut shard = self
                .shard(entry.state)
                .write()
                .unwrap_or_else(|p| p.into_inner());
            shard.insert(entry.state, entry.values);
        }
    }
}

/// Optimizer tuning knobs.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Exploration rate for epsilon-greedy selection
    pub epsilon: f64,
    /// Learning rate α for the TD update
    pub learning_rate: f64,
    /// Discount factor γ
    pub discount: f64,
    /// Reward component weights (must sum to 1)
    pub reward_weights: RewardWeights,
    /// Deadline for each provider call
    pub provider_deadline: std::time::Duration,
    /// Seed for the exploration RNG; `None` seeds from entropy
    pub rng_seed: Option<u64>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.1,
            learning_rate: 0.01,
            discount: 0.95,
            reward_weights: RewardWeights::default(),
            provider_deadline: std::time::Duration::from_millis(250),
            rng_seed: None,
        }
    }
}

impl OptimizerConfig {
    /// Reject out-of-range hyperparameters.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(Error::config(format!("epsilon out of [0, 1]: {}", self.epsilon)));
        }
        if !(0.0..=1.0).contains(&self.learning_rate) || self.learning_rate == 0.0 {
            return Err(Error::config(format!(
                "learning_rate out of (0, 1]: {}",
                self.learning_rate
            )));
        }
        if !(0.0..1.0).contains(&self.discount) {
            return Err(Error::config(format!(
                "discount out of [0, 1): {}",
                self.discount
            )));
        }
        self.reward_weights.validate()
    }
}

/// Rolling optimizer statistics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OptimizerSummary {
    pub episodes: u64,
    pub states_visited: usize,
    pub recent_avg_reward: f64,
}

const RECENT_REWARD_WINDOW: usize = 1000;

/// The pricing service: one instance per deployment, safe to share across
/// request tasks. All learned state lives in the injected [`QTable`].
pub struct PricingOptimizer {
    config: OptimizerConfig,
    q_table: Arc<QTable>,
    builder: PricingStateBuilder,
    reward: RewardCalculator,
    constraints: RwLock<HashMap<String, PricingConstraints>>,
    rng: Mutex<SmallRng>,
    episodes: AtomicU64,
    recent_rewards: Mutex<VecDeque<f64>>,
    last_good: RwLock<HashMap<String, PriceDecision>>,
}

impl PricingOptimizer {
    /// Build an optimizer over the given providers and (shared) Q-table.
    pub fn new(
        config: OptimizerConfig,
        market: Arc<dyn MarketDataProvider>,
        catalog: Arc<dyn CatalogProvider>,
        q_table: Arc<QTable>,
    ) -> Result<Self> {
        config.validate()?;
        let reward = RewardCalculator::new(config.reward_weights)?;
        let builder = PricingStateBuilder::new(market, catalog, config.provider_deadline);
        let rng = match config.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Ok(Self {
            config,
            q_table,
            builder,
            reward,
            constraints: RwLock::new(HashMap::new()),
            rng: Mutex::new(rng),
            episodes: AtomicU64::new(0),
            recent_rewards: Mutex::new(VecDeque::with_capacity(RECENT_REWARD_WINDOW)),
            last_good: RwLock::new(HashMap::new()),
        })
    }

    /// Register (or replace) the pricing rules for a product.
    pub fn set_constraints(&self, product_id: &str, constraints: PricingConstraints) -> Result<()> {
        constraints.validate()?;
        self.constraints
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(product_id.to_string(), constraints);
        Ok(())
    }

    fn constraints_for(&self, product_id: &str) -> Result<PricingConstraints> {
        self.constraints
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(product_id)
            .copied()
            .ok_or_else(|| Error::config(format!("no pricing constraints for {product_id}")))
    }

    /// Propose, clamp, and learn from a price for `product_id`, for a
    /// request from a user in `tier`.
    ///
    /// The single side effect of a successful call is one Q-table row
    /// update; validation failures happen before any mutation. Upstream
    /// timeouts degrade to the last-known-good decision instead of failing.
    pub async fn optimize_price(&self, product_id: &str, tier: UserTier) -> Result<PriceDecision> {
        let constraints = self.constraints_for(product_id)?;

        let built = match self.builder.build(product_id, tier).await {
            Ok(built) => built,
            Err(err) if err.is_recoverable() => {
                return Ok(self.degraded_decision(product_id, &constraints));
            }
            Err(err) => return Err(err),
        };
        let state = built.state;

        let key = state.encode().to_index();
        let row = self.q_table.row(key);
        let action = self.select_action(row);

        let proposed = state.current_price * action.multiplier();
        let outcome = enforce(
            proposed,
            state.current_price,
            &state.competitor_prices,
            tier,
            &constraints,
        );

        let breakdown = self.reward.evaluate(&state, outcome.price, built.demand_delta);
        let successor_key = state.successor(outcome.price).encode().to_index();
        let future_value = self.q_table.max_q(successor_key);

        let confidence = confidence_for(row.as_ref(), action, self.config.epsilon);
        let new_q = self.q_table.update(
            key,
            action,
            breakdown.total,
            future_value,
            self.config.learning_rate,
            self.config.discount,
        );

        self.episodes.fetch_add(1, Ordering::Relaxed);
        {
            let mut recent = self.recent_rewards.lock().unwrap_or_else(|p| p.into_inner());
            if recent.len() == RECENT_REWARD_WINDOW {
                recent.pop_front();
            }
            recent.push_back(breakdown.total);
        }

        debug!(
            product_id,
            state = key,
            action = action.label(),
            reward = %format!("{:.4}", breakdown.total),
            future_value = %format!("{:.4}", future_value),
            q = %format!("{:.4}", new_q),
            price = %format!("{:.2}", outcome.price),
            "pricing update"
        );

        let decision = PriceDecision {
            multiplier: action.multiplier(),
            price: outcome.price,
            reasoning: reasoning(action, &outcome),
            confidence,
        };
        self.last_good
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(product_id.to_string(), decision.clone());
        Ok(decision)
    }

    /// Multiplier for an experiment arm: the greedy (exploitation-only)
    /// multiplier scaled ±10% for the aggressive/conservative arms.
    ///
    /// Never mutates the Q-table. State is encoded at the `Free` tier so all
    /// arms of an experiment read the same row.
    pub async fn get_test_price(&self, product_id: &str, group: PricingGroup) -> Result<f64> {
        let _ = self.constraints_for(product_id)?;
        let base = match self.builder.build(product_id, UserTier::Free).await {
            Ok(built) => {
                let key = built.state.encode().to_index();
                let row = self.q_table.row(key).unwrap_or([0.0; PriceAction::COUNT]);
                greedy_action(&row).multiplier()
            }
            Err(err) if err.is_recoverable() => PriceAction::Hold.multiplier(),
            Err(err) => return Err(err),
        };
        Ok(base * group.multiplier_scale())
    }

    /// Rolling learning statistics.
    pub fn summary(&self) -> OptimizerSummary {
        let recent = self.recent_rewards.lock().unwrap_or_else(|p| p.into_inner());
        let recent_avg_reward = if recent.is_empty() {
            0.0
        } else {
            recent.iter().sum::<f64>() / recent.len() as f64
        };
        OptimizerSummary {
            episodes: self.episodes.load(Ordering::Relaxed),
            states_visited: self.q_table.states_visited(),
            recent_avg_reward,
        }
    }

    /// Explicitly drop all learned values and counters.
    pub fn reset(&self) {
        self.q_table.reset();
        self.episodes.store(0, Ordering::Relaxed);
        self.recent_rewards
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
        info!("pricing optimizer reset");
    }

    fn select_action(&self, row: Option<[f64; PriceAction::COUNT]>) -> PriceAction {
        if self.config.epsilon > 0.0 {
            let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
            if rng.gen::<f64>() < self.config.epsilon {
                return PriceAction::ALL[rng.gen_range(0..PriceAction::COUNT)];
            }
        }
        greedy_action(&row.unwrap_or([0.0; PriceAction::COUNT]))
    }

    /// Deterministic answer when the upstream is cold and unreachable:
    /// the last-known-good decision at half confidence, else a hold at the
    /// midpoint of the constraint band.
    fn degraded_decision(
        &self,
        product_id: &str,
        constraints: &PricingConstraints,
    ) -> PriceDecision {
        if let Some(mut cached) = self
            .last_good
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(product_id)
            .cloned()
        {
            cached.confidence *= 0.5;
            cached.reasoning = format!("{} (stale: upstream timeout)", cached.reasoning);
            return cached;
        }
        PriceDecision {
            multiplier: PriceAction::Hold.multiplier(),
            price: (constraints.min_price + constraints.max_price) / 2.0,
            reasoning: "upstream timeout with no history; holding at reference price".to_string(),
            confidence: 0.1,
        }
    }
}

/// Q-derived confidence: `Q(s,a) / (maxₐ Q(s,·) + ε)`, clamped to [0, 1].
/// Unseen states (and degenerate denominators) default to 0.5.
fn confidence_for(
    row: Option<&[f64; PriceAction::COUNT]>,
    action: PriceAction,
    epsilon: f64,
) -> f64 {
    let Some(row) = row else {
        return 0.5;
    };
    let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let denom = max + epsilon;
    if denom.abs() < 1e-9 {
        return 0.5;
    }
    (row[action.index()] / denom).clamp(0.0, 1.0)
}

fn reasoning(action: PriceAction, outcome: &ClampOutcome) -> String {
    if outcome.applied.is_empty() {
        return format!("{}; no clamps applied", action.label());
    }
    let clamps: Vec<&str> = outcome.applied.iter().map(|r| r.label()).collect();
    format!("{}; clamped by {}", action.label(), clamps.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::memory::{MemoryCatalog, MemoryMarketData};
    use crate::providers::ExternalFactors;
    use crate::types::ModelFeatures;
    use chrono::{Duration as ChronoDuration, Utc};

    fn seed_product(catalog: &MemoryCatalog, market: &MemoryMarketData) {
        catalog.upsert(ModelFeatures {
            id: "p1".to_string(),
            category: "analytics".to_string(),
            tags: vec!["forecast".to_string()],
            price: 100.0,
            performance: 0.7,
            usage_count: 500,
            average_rating: 4.3,
            created_at: Utc::now() - ChronoDuration::days(60),
        });
        market.set_competitor_prices("p1", vec![90.0, 95.0, 100.0]);
        market.set_demand_series("p1", vec![40.0; 14]);
        market.set_factors(
            "p1",
            ExternalFactors {
                seasonal_factor: 1.0,
                inventory_level: 25.0,
                conversion_rate: 0.05,
                price_elasticity: -1.5,
            },
        );
    }

    fn optimizer(config: OptimizerConfig) -> PricingOptimizer {
        let catalog = Arc::new(MemoryCatalog::new());
        let market = Arc::new(MemoryMarketData::new());
        seed_product(&catalog, &market);
        let opt =
            PricingOptimizer::new(config, market, catalog, Arc::new(QTable::new())).unwrap();
        opt.set_constraints("p1", PricingConstraints::around(80.0, 150.0))
            .unwrap();
        opt
    }

    fn exploring_config() -> OptimizerConfig {
        OptimizerConfig {
            epsilon: 0.5,
            rng_seed: Some(7),
            ..OptimizerConfig::default()
        }
    }

    #[test]
    fn greedy_tie_break_prefers_smallest_change() {
        // Fresh row: everything ties at zero, hold wins.
        assert_eq!(greedy_action(&[0.0; 5]), PriceAction::Hold);
        // Tie between discount and raise resolves to the lower index.
        let mut row = [0.0; 5];
        row[PriceAction::Discount.index()] = 1.0;
        row[PriceAction::Raise.index()] = 1.0;
        assert_eq!(greedy_action(&row), PriceAction::Discount);
        // A strictly better value always wins.
        row[PriceAction::Surge.index()] = 2.0;
        assert_eq!(greedy_action(&row), PriceAction::Surge);
    }

    #[tokio::test]
    async fn price_respects_bounds_and_daily_band() {
        let opt = optimizer(exploring_config());
        for _ in 0..100 {
            let decision = opt.optimize_price("p1", UserTier::Free).await.unwrap();
            assert!((80.0..=150.0).contains(&decision.price));
            assert!(
                (90.0..=110.0).contains(&decision.price),
                "outside daily band: {}",
                decision.price
            );
            // Clamp intersection with the competitor buffer [85.5, 104.5].
            assert!(
                (90.0..=104.5).contains(&decision.price),
                "outside clamp intersection: {}",
                decision.price
            );
        }
    }

    #[tokio::test]
    async fn fairness_is_monotone_across_tiers() {
        let config = OptimizerConfig {
            epsilon: 0.0,
            ..OptimizerConfig::default()
        };
        let opt = optimizer(config);
        let free = opt.optimize_price("p1", UserTier::Free).await.unwrap();
        let premium = opt.optimize_price("p1", UserTier::Premium).await.unwrap();
        let enterprise = opt
            .optimize_price("p1", UserTier::Enterprise)
            .await
            .unwrap();
        assert!(premium.price <= free.price, "premium must not pay more than free");
        assert!(
            enterprise.price <= premium.price,
            "enterprise must not pay more than premium"
        );
    }

    #[tokio::test]
    async fn zero_epsilon_is_deterministic() {
        let config = OptimizerConfig {
            epsilon: 0.0,
            ..OptimizerConfig::default()
        };
        let opt = optimizer(config);
        let first = opt.optimize_price("p1", UserTier::Free).await.unwrap();
        let second = opt.optimize_price("p1", UserTier::Free).await.unwrap();
        assert_eq!(first.multiplier, second.multiplier);
        assert_eq!(first.price, second.price);
    }

    #[tokio::test]
    async fn missing_constraints_is_a_configuration_error() {
        let opt = optimizer(OptimizerConfig::default());
        let err = opt.optimize_price("p2", UserTier::Free).await.unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "got {err}");
    }

    #[tokio::test]
    async fn invalid_state_fails_before_any_mutation() {
        let catalog = Arc::new(MemoryCatalog::new());
        let market = Arc::new(MemoryMarketData::new());
        seed_product(&catalog, &market);
        // Corrupt the rating so state validation must reject it.
        catalog.upsert(ModelFeatures {
            id: "p1".to_string(),
            category: "analytics".to_string(),
            tags: vec![],
            price: 100.0,
            performance: 0.7,
            usage_count: 500,
            average_rating: 7.5,
            created_at: Utc::now(),
        });
        let table = Arc::new(QTable::new());
        let opt = PricingOptimizer::new(
            OptimizerConfig::default(),
            market,
            catalog,
            Arc::clone(&table),
        )
        .unwrap();
        opt.set_constraints("p1", PricingConstraints::around(80.0, 150.0))
            .unwrap();

        let err = opt.optimize_price("p1", UserTier::Free).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)), "got {err}");
        assert_eq!(table.states_visited(), 0, "failed call must not touch the table");
    }

    #[tokio::test]
    async fn test_price_scales_arms_without_learning() {
        let opt = optimizer(OptimizerConfig {
            epsilon: 0.0,
            ..OptimizerConfig::default()
        });
        let control = opt.get_test_price("p1", PricingGroup::Control).await.unwrap();
        let aggressive = opt
            .get_test_price("p1", PricingGroup::Aggressive)
            .await
            .unwrap();
        let conservative = opt
            .get_test_price("p1", PricingGroup::Conservative)
            .await
            .unwrap();
        assert!((aggressive - control * 1.1).abs() < 1e-12);
        assert!((conservative - control * 0.9).abs() < 1e-12);
        assert_eq!(opt.summary().episodes, 0, "test pricing must not learn");
        assert_eq!(opt.summary().states_visited, 0);
    }

    #[tokio::test]
    async fn learning_update_moves_toward_reward() {
        let config = OptimizerConfig {
            epsilon: 0.0,
            learning_rate: 0.5,
            ..OptimizerConfig::default()
        };
        let opt = optimizer(config);
        opt.optimize_price("p1", UserTier::Free).await.unwrap();
        let summary = opt.summary();
        assert_eq!(summary.episodes, 1);
        assert_eq!(summary.states_visited, 1);
        // Holding at a 4.3-star product near competitors scores positive.
        assert!(summary.recent_avg_reward > 0.0);
    }

    #[tokio::test]
    async fn reset_clears_learned_state() {
        let opt = optimizer(exploring_config());
        for _ in 0..5 {
            opt.optimize_price("p1", UserTier::Free).await.unwrap();
        }
        assert!(opt.summary().episodes > 0);
        opt.reset();
        let summary = opt.summary();
        assert_eq!(summary.episodes, 0);
        assert_eq!(summary.states_visited, 0);
    }

    #[test]
    fn q_table_checkpoint_round_trip() {
        let table = QTable::new();
        table.update(42, PriceAction::Raise, 1.0, 0.0, 0.5, 0.95);
        table.update(7, PriceAction::Hold, -0.5, 0.2, 0.5, 0.95);
        let snapshot = table.snapshot();
        assert_eq!(snapshot.len(), 2);

        let restored = QTable::new();
        restored.restore(&snapshot);
        assert_eq!(restored.row(42), table.row(42));
        assert_eq!(restored.row(7), table.row(7));
    }

    #[test]
    fn unseen_state_confidence_defaults() {
        assert_eq!(confidence_for(None, PriceAction::Hold, 0.1), 0.5);
        let mut row = [0.0; 5];
        row[PriceAction::Hold.index()] = 0.4;
        let c = confidence_for(Some(&row), PriceAction::Hold, 0.1);
        assert!((c - 0.4 / 0.5).abs() < 1e-12);
    }
}
