//! Pricing state: the point-in-time snapshot priced by the optimizer, and
//! its discretization into a Q-table row key.
//!
//! The continuous state is bucketed along five axes (demand decile,
//! conversion quintile, rounded review score, catalog-age bucket, user tier)
//! giving 10 × 5 × 6 × 4 × 3 = 3600 discrete states. Each axis has
//! `index()` / `from_index()` / `COUNT`, and [`StateKey::to_index`] flattens
//! the composite for table lookup.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::providers::upstream::FallbackCache;
use crate::providers::{CatalogProvider, ExternalFactors, MarketDataProvider};
use crate::types::UserTier;

/// Everything needed to price one product for one request.
/// Built fresh per call; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingState {
    pub product_id: String,
    pub current_price: f64,
    /// Forecast demand, units/day
    pub demand_forecast: f64,
    pub competitor_prices: Vec<f64>,
    pub inventory_level: f64,
    pub hour_of_day: u8,
    pub day_of_week: u8,
    /// Days since the item entered the catalog
    pub model_age_days: f64,
    /// Average review rating in [0, 5]
    pub review_score: f64,
    /// View→purchase conversion in [0, 1]
    pub conversion_rate: f64,
    /// Own-price elasticity (typically negative)
    pub price_elasticity: f64,
    pub seasonal_factor: f64,
    pub user_tier: UserTier,
}

impl PricingState {
    /// Reject non-finite or out-of-range inputs. Runs before any Q-table
    /// mutation so a bad state never corrupts learned values.
    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("current_price", self.current_price),
            ("demand_forecast", self.demand_forecast),
            ("inventory_level", self.inventory_level),
            ("model_age_days", self.model_age_days),
            ("review_score", self.review_score),
            ("conversion_rate", self.conversion_rate),
            ("price_elasticity", self.price_elasticity),
            ("seasonal_factor", self.seasonal_factor),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(Error::invalid_state(format!(
                    "{name} is not finite: {value}"
                )));
            }
        }
        if self.current_price <= 0.0 {
            return Err(Error::invalid_state(format!(
                "current_price must be positive, got {}",
                self.current_price
            )));
        }
        if !(0.0..=5.0).contains(&self.review_score) {
            return Err(Error::invalid_state(format!(
                "review_score out of [0, 5]: {}",
                self.review_score
            )));
        }
        if !(0.0..=1.0).contains(&self.conversion_rate) {
            return Err(Error::invalid_state(format!(
                "conversion_rate out of [0, 1]: {}",
                self.conversion_rate
            )));
        }
        if self.competitor_prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(Error::invalid_state(
                "competitor prices must be finite and positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Discretize into a Q-table row key.
    pub fn encode(&self) -> StateKey {
        StateKey {
            demand: DemandDecile::from_forecast(self.demand_forecast),
            conversion: ConversionBucket::from_rate(self.conversion_rate),
            review: ReviewBucket::from_score(self.review_score),
            age: AgeBucket::from_days(self.model_age_days),
            tier: self.user_tier,
        }
    }

    /// Mean competitor price, `None` when no competitors are tracked.
    pub fn competitor_average(&self) -> Option<f64> {
        if self.competitor_prices.is_empty() {
            return None;
        }
        Some(self.competitor_prices.iter().sum::<f64>() / self.competitor_prices.len() as f64)
    }

    /// The state reached after repricing to `new_price`, used to bootstrap
    /// the future-value term of the Bellman update.
    ///
    /// Demand and conversion shift by elasticity × relative price change
    /// (first-order demand response); everything else carries over. The
    /// successor is only ever encoded and read, never priced.
    pub fn successor(&self, new_price: f64) -> PricingState {
        let price_change = (new_price - self.current_price) / self.current_price;
        let demand_shift = 1.0 + self.price_elasticity * price_change;
        let mut next = self.clone();
        next.current_price = new_price;
        next.demand_forecast = (self.demand_forecast * demand_shift).max(0.0);
        next.conversion_rate = (self.conversion_rate * demand_shift).clamp(0.0, 1.0);
        next
    }
}

/// Demand decile (0-9). Forecast units/day on a 0-100 reference scale,
/// 10 units per decile, saturating at the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DemandDecile(u8);

impl DemandDecile {
    /// Units of demand spanned by one decile.
    pub const SPAN: f64 = 10.0;

    /// Convert a forecast to its decile.
    pub fn from_forecast(forecast: f64) -> Self {
        let decile = (forecast.max(0.0) / Self::SPAN).floor() as u64;
        Self(decile.min(9) as u8)
    }

    /// Get decile index (0-9).
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    /// Number of deciles.
    pub const COUNT: usize = 10;
}

/// Conversion-rate quintile bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversionBucket {
    /// < 1% of views convert
    VeryLow,
    /// 1% to 3%
    Low,
    /// 3% to 6%
    Mid,
    /// 6% to 12%
    High,
    /// > 12%
    VeryHigh,
}

impl ConversionBucket {
    /// Convert a conversion rate to its bucket.
    pub fn from_rate(rate: f64) -> Self {
        match rate {
            r if r < 0.01 => Self::VeryLow,
            r if r < 0.03 => Self::Low,
            r if r < 0.06 => Self::Mid,
            r if r < 0.12 => Self::High,
            _ => Self::VeryHigh,
        }
    }

    /// Get bucket index (0-4).
    pub fn index(&self) -> usize {
        match self {
            Self::VeryLow => 0,
            Self::Low => 1,
            Self::Mid => 2,
            Self::High => 3,
            Self::VeryHigh => 4,
        }
    }

    /// Number of buckets.
    pub const COUNT: usize = 5;
}

/// Review score rounded to the nearest whole star (0-5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewBucket(u8);

impl ReviewBucket {
    /// Round a [0, 5] score to its bucket.
    pub fn from_score(score: f64) -> Self {
        Self(score.clamp(0.0, 5.0).round() as u8)
    }

    /// Get bucket index (0-5).
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    /// Number of buckets.
    pub const COUNT: usize = 6;
}

/// Catalog age in weeks, bucketed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeBucket {
    /// First four weeks in the catalog
    New,
    /// One to three months
    Recent,
    /// Three months to a year
    Established,
    /// Over a year
    Mature,
}

impl AgeBucket {
    /// Convert age in days to its bucket.
    pub fn from_days(days: f64) -> Self {
        let weeks = days.max(0.0) / 7.0;
        match weeks {
            w if w < 4.0 => Self::New,
            w if w < 12.0 => Self::Recent,
            w if w < 52.0 => Self::Established,
            _ => Self::Mature,
        }
    }

    /// Get bucket index (0-3).
    pub fn index(&self) -> usize {
        match self {
            Self::New => 0,
            Self::Recent => 1,
            Self::Established => 2,
            Self::Mature => 3,
        }
    }

    /// Number of buckets.
    pub const COUNT: usize = 4;
}

/// Complete discretized pricing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateKey {
    pub demand: DemandDecile,
    pub conversion: ConversionBucket,
    pub review: ReviewBucket,
    pub age: AgeBucket,
    pub tier: UserTier,
}

impl StateKey {
    /// Flatten to a table index.
    pub fn to_index(self) -> u64 {
        let mut idx = self.demand.index();
        idx = idx * ConversionBucket::COUNT + self.conversion.index();
        idx = idx * ReviewBucket::COUNT + self.review.index();
        idx = idx * AgeBucket::COUNT + self.age.index();
        idx = idx * UserTier::COUNT + self.tier.index();
        idx as u64
    }

    /// Total number of discrete states.
    pub const STATE_COUNT: usize = DemandDecile::COUNT
        * ConversionBucket::COUNT
        * ReviewBucket::COUNT
        * AgeBucket::COUNT
        * UserTier::COUNT;
}

/// A built state plus the observed demand delta that feeds the reward.
#[derive(Debug, Clone)]
pub struct BuiltState {
    pub state: PricingState,
    /// Relative change of trailing-week demand vs the prior week, from the
    /// real historical series (no synthetic noise).
    pub demand_delta: f64,
}

/// Trailing-window relative demand change from a daily series.
///
/// Compares the mean of the last `window` points against the mean of the
/// `window` before it. Returns 0 when the series is too short or flat.
pub fn observed_demand_delta(series: &[f64], window: usize) -> f64 {
    if window == 0 || series.len() < 2 * window {
        return 0.0;
    }
    let recent = &series[series.len() - window..];
    let prior = &series[series.len() - 2 * window..series.len() - window];
    let recent_mean = recent.iter().sum::<f64>() / window as f64;
    let prior_mean = prior.iter().sum::<f64>() / window as f64;
    if prior_mean.abs() < f64::EPSILON {
        return 0.0;
    }
    (recent_mean - prior_mean) / prior_mean
}

/// Assembles a [`PricingState`] from the market and catalog providers, with
/// deadline-bound fetches and last-known-good fallback per product.
pub struct PricingStateBuilder {
    market: Arc<dyn MarketDataProvider>,
    catalog: Arc<dyn CatalogProvider>,
    competitor_cache: FallbackCache<Vec<f64>>,
    demand_cache: FallbackCache<Vec<f64>>,
    factors_cache: FallbackCache<ExternalFactors>,
    features_cache: FallbackCache<Option<crate::types::ModelFeatures>>,
    demand_window: usize,
}

impl PricingStateBuilder {
    /// `deadline` bounds every individual provider call.
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        catalog: Arc<dyn CatalogProvider>,
        deadline: Duration,
    ) -> Self {
        Self {
            market,
            catalog,
            competitor_cache: FallbackCache::new("market_data.competitor_prices", deadline),
            demand_cache: FallbackCache::new("market_data.historical_demand", deadline),
            factors_cache: FallbackCache::new("market_data.external_factors", deadline),
            features_cache: FallbackCache::new("catalog.item_features", deadline),
            demand_window: 7,
        }
    }

    /// Build the snapshot for one product and requesting tier.
    ///
    /// Fails with `Configuration` for unknown products, `UpstreamTimeout`
    /// only when the catalog is cold and unreachable (the optimizer converts
    /// that into a degraded hold decision).
    pub async fn build(&self, product_id: &str, tier: UserTier) -> Result<BuiltState> {
        let features = self
            .features_cache
            .fetch(product_id, || self.catalog.item_features(product_id))
            .await?
            .ok_or_else(|| Error::config(format!("unknown product: {product_id}")))?;

        let competitor_prices = self
            .competitor_cache
            .fetch(product_id, || self.market.competitor_prices(product_id))
            .await
            .unwrap_or_default();
        let demand_series = self
            .demand_cache
            .fetch(product_id, || self.market.historical_demand(product_id))
            .await
            .unwrap_or_default();
        let factors = self
            .factors_cache
            .fetch(product_id, || self.market.external_factors(product_id))
            .await
            .unwrap_or_default();

        let now = Utc::now();
        let trailing = demand_series
            .iter()
            .rev()
            .take(self.demand_window)
            .sum::<f64>()
            / self.demand_window.max(1) as f64;

        let state = PricingState {
            product_id: product_id.to_string(),
            current_price: features.price,
            demand_forecast: trailing * factors.seasonal_factor,
            competitor_prices,
            inventory_level: factors.inventory_level,
            hour_of_day: now.hour() as u8,
            day_of_week: now.weekday().num_days_from_monday() as u8,
            model_age_days: (now - features.created_at).num_seconds() as f64 / 86_400.0,
            review_score: features.average_rating,
            conversion_rate: factors.conversion_rate,
            price_elasticity: factors.price_elasticity,
            seasonal_factor: factors.seasonal_factor,
            user_tier: tier,
        };
        state.validate()?;

        Ok(BuiltState {
            state,
            demand_delta: observed_demand_delta(&demand_series, self.demand_window),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_state() -> PricingState {
        PricingState {
            product_id: "p1".to_string(),
            current_price: 100.0,
            demand_forecast: 42.0,
            competitor_prices: vec![90.0, 95.0, 100.0],
            inventory_level: 25.0,
            hour_of_day: 14,
            day_of_week: 2,
            model_age_days: 40.0,
            review_score: 4.3,
            conversion_rate: 0.05,
            price_elasticity: -1.5,
            seasonal_factor: 1.0,
            user_tier: UserTier::Free,
        }
    }

    #[test]
    fn validates_finite_inputs() {
        let mut state = base_state();
        state.demand_forecast = f64::NAN;
        assert!(matches!(
            state.validate(),
            Err(Error::InvalidState(_))
        ));

        let mut state = base_state();
        state.conversion_rate = 1.5;
        assert!(state.validate().is_err());

        assert!(base_state().validate().is_ok());
    }

    #[test]
    fn demand_decile_saturates() {
        assert_eq!(DemandDecile::from_forecast(0.0).index(), 0);
        assert_eq!(DemandDecile::from_forecast(42.0).index(), 4);
        assert_eq!(DemandDecile::from_forecast(99.9).index(), 9);
        assert_eq!(DemandDecile::from_forecast(1e9).index(), 9);
        assert_eq!(DemandDecile::from_forecast(-5.0).index(), 0);
    }

    #[test]
    fn conversion_bucket_boundaries() {
        assert_eq!(ConversionBucket::from_rate(0.0), ConversionBucket::VeryLow);
        assert_eq!(ConversionBucket::from_rate(0.01), ConversionBucket::Low);
        assert_eq!(ConversionBucket::from_rate(0.05), ConversionBucket::Mid);
        assert_eq!(ConversionBucket::from_rate(0.2), ConversionBucket::VeryHigh);
    }

    #[test]
    fn state_index_is_unique_per_bucket_combination() {
        // Distinct keys along each axis must land in distinct rows.
        let a = base_state().encode();
        let mut b = base_state();
        b.user_tier = UserTier::Premium;
        let c = {
            let mut s = base_state();
            s.review_score = 2.0;
            s
        };
        assert_ne!(a.to_index(), b.encode().to_index());
        assert_ne!(a.to_index(), c.encode().to_index());
        assert!((a.to_index() as usize) < StateKey::STATE_COUNT);
    }

    #[test]
    fn successor_shifts_demand_by_elasticity() {
        let state = base_state();
        // 10% price increase at elasticity -1.5 → demand scaled by 0.85.
        let next = state.successor(110.0);
        assert!((next.demand_forecast - 42.0 * 0.85).abs() < 1e-9);
        assert!(next.conversion_rate < state.conversion_rate);

        // Price cut increases demand.
        let cut = state.successor(90.0);
        assert!(cut.demand_forecast > state.demand_forecast);
    }

    #[test]
    fn demand_delta_uses_real_series() {
        // Prior week averages 10, trailing week averages 12 → +20%.
        let series = vec![10.0; 7]
            .into_iter()
            .chain(vec![12.0; 7])
            .collect::<Vec<_>>();
        let delta = observed_demand_delta(&series, 7);
        assert!((delta - 0.2).abs() < 1e-12, "got {delta}");

        assert_eq!(observed_demand_delta(&[1.0, 2.0], 7), 0.0);
    }
}
