//! Hybrid recommendations: interaction matrix and factor profiles, component
//! scoring, diversity re-ranking, and the engine facade.
//!
//! - `matrix`: sparse interaction strengths + low-rank factor snapshots
//! - `scorer`: collaborative/content/popularity/business component scores
//! - `diversity`: category-penalty re-ranking
//! - `engine`: the public recommendation entry points

mod diversity;
mod engine;
mod matrix;
mod scorer;

pub use diversity::{max_category_count, rerank, ScoredCandidate};
pub use engine::{RecommendationConfig, RecommendationEngine};
pub use matrix::{
    interaction_strength, FactorModel, FactorStore, InteractionMatrix, TrainConfig,
};
pub use scorer::{
    business_score, collaborative_score, content_score, cosine, mean_embedding, popularity_score,
    BusinessConfig, HybridWeights, PopularityConfig, ScoreBreakdown,
};
