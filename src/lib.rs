//! Marketplace intelligence core for a storefront: a constrained Q-learning
//! price optimizer and a hybrid recommendation engine, sharing a data model,
//! provider interfaces, and a deterministic experiment router.
//!
//! Both engines are synchronous request/response services from the caller's
//! point of view: the storefront calls [`PricingOptimizer::optimize_price`]
//! or [`RecommendationEngine::get_recommendations`] per request and feeds
//! interaction events back through
//! [`RecommendationEngine::update_user_profile`]. All provider calls are
//! deadline-bound with last-known-good fallback, so a slow upstream degrades
//! the answer instead of failing it.

#![deny(unreachable_pub)]

mod errors;
pub mod experiment;
pub mod pricing;
pub mod providers;
pub mod recommend;
pub mod types;

pub use errors::{Error, Result};
pub use experiment::{ArmStats, ExperimentArm, ExperimentRouter, PricingGroup};
pub use pricing::{
    OptimizerConfig, OptimizerSummary, PriceAction, PricingConstraints, PricingOptimizer, QTable,
    RewardWeights,
};
pub use recommend::{
    HybridWeights, InteractionMatrix, RecommendationConfig, RecommendationEngine,
};
pub use types::{
    ModelFeatures, PriceDecision, RecReason, RecommendationResult, UserInteraction, UserTier,
};
