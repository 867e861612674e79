//! Dynamic pricing: state assembly, constraint enforcement, reward scoring,
//! and the Q-learning optimizer.
//!
//! - `state`: continuous snapshot + discretization into Q-table keys
//! - `constraints`: ordered hard/competitive/fairness clamps
//! - `reward`: weighted outcome scoring for the learner
//! - `optimizer`: epsilon-greedy agent and the public pricing entry points

mod constraints;
mod optimizer;
mod reward;
mod state;

pub use constraints::{enforce, ClampOutcome, ClampRule, PricingConstraints};
pub use optimizer::{
    OptimizerConfig, OptimizerSummary, PriceAction, PricingOptimizer, QTable, QTableEntry,
};
pub use reward::{RewardBreakdown, RewardCalculator, RewardWeights};
pub use state::{
    observed_demand_delta, AgeBucket, BuiltState, ConversionBucket, DemandDecile, PricingState,
    PricingStateBuilder, ReviewBucket, StateKey,
};
