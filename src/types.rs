//! Shared data model for the pricing and recommendation engines.
//!
//! Catalog features and interaction events are owned by external systems and
//! refreshed through the provider traits; everything here is a plain value
//! type that crosses the engine boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Customer tier used for fairness pricing and state encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserTier {
    /// No negotiated discount.
    Free,
    /// Paid individual plan, small fixed discount.
    Premium,
    /// Volume contract, larger discount.
    Enterprise,
}

impl UserTier {
    /// Get tier index (0-2).
    pub fn index(&self) -> usize {
        match self {
            Self::Free => 0,
            Self::Premium => 1,
            Self::Enterprise => 2,
        }
    }

    /// Number of tiers.
    pub const COUNT: usize = 3;

    /// Reconstruct from tier index (0-2).
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Free,
            1 => Self::Premium,
            2 => Self::Enterprise,
            _ => Self::Free,
        }
    }
}

/// Catalog features for one item, refreshed externally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFeatures {
    /// Catalog item id
    pub id: String,
    /// Primary category (used by the diversity re-ranker)
    pub category: String,
    /// Free-form tags
    pub tags: Vec<String>,
    /// Current list price
    pub price: f64,
    /// Normalized performance/complexity metric in [0, 1]
    pub performance: f64,
    /// Lifetime usage count
    pub usage_count: u64,
    /// Average review rating in [0, 5]
    pub average_rating: f64,
    /// When the item entered the catalog
    pub created_at: DateTime<Utc>,
}

/// One user/item interaction event. Append-only; aggregated into a
/// per-(user, item) interaction strength by the recommendation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInteraction {
    pub user_id: String,
    pub item_id: String,
    /// Explicit rating in [0, 5], when the user left one
    pub rating: Option<f64>,
    pub purchased: bool,
    pub viewed: bool,
    /// Dwell time on the item page, in seconds
    pub time_spent_secs: f64,
    pub timestamp: DateTime<Utc>,
}

impl UserInteraction {
    /// A bare page view at `timestamp`.
    pub fn view(user_id: impl Into<String>, item_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            item_id: item_id.into(),
            rating: None,
            purchased: false,
            viewed: true,
            time_spent_secs: 0.0,
            timestamp,
        }
    }

    /// A purchase at `timestamp`.
    pub fn purchase(user_id: impl Into<String>, item_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            item_id: item_id.into(),
            rating: None,
            purchased: true,
            viewed: true,
            time_spent_secs: 0.0,
            timestamp,
        }
    }
}

/// Dominant signal behind a recommendation, surfaced to the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecReason {
    /// Users with similar interaction patterns engaged with this item
    Collaborative,
    /// Embedding similarity to the user's history
    Content,
    /// Broadly popular / trending item
    Popularity,
    /// Business-weighted (margin/quality) pick
    Business,
    /// Cold-start fallback, no per-user signal available
    ColdStart,
}

impl std::fmt::Display for RecReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Collaborative => "similar users engaged with this",
            Self::Content => "similar to items in your history",
            Self::Popularity => "popular right now",
            Self::Business => "featured pick",
            Self::ColdStart => "popular with new users",
        };
        f.write_str(s)
    }
}

/// One ranked recommendation. Ephemeral, produced per call, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub item_id: String,
    /// Final (diversity-adjusted) score
    pub score: f64,
    pub reason: RecReason,
    /// Data-coverage confidence in [0, 1]
    pub confidence: f64,
}

/// Outcome of one pricing call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceDecision {
    /// Selected discrete multiplier (before clamping)
    pub multiplier: f64,
    /// Final price after all clamps and the fairness discount
    pub price: f64,
    /// Human-readable account of the action and clamps applied
    pub reasoning: String,
    /// Q-value-derived confidence in [0, 1]; 0.5 for unseen states
    pub confidence: f64,
}
