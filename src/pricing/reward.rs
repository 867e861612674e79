//! Reward signal for the pricing learner.
//!
//! Four weighted components score the outcome of a repricing:
//! revenue impact, competitive advantage, customer satisfaction, and a
//! market-share proxy. The demand response inside the revenue term combines
//! the elasticity estimate with the *observed* trailing demand delta from
//! the historical series — there is deliberately no synthetic noise here.

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

use super::state::PricingState;

/// Weights over the reward components. Must sum to 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RewardWeights {
    pub revenue: f64,
    pub competitive: f64,
    pub satisfaction: f64,
    pub market_share: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            revenue: 0.4,
            competitive: 0.2,
            satisfaction: 0.2,
            market_share: 0.2,
        }
    }
}

impl RewardWeights {
    /// Weights must be non-negative and sum to 1 (±1e-6).
    pub fn validate(&self) -> Result<()> {
        let parts = [
            self.revenue,
            self.competitive,
            self.satisfaction,
            self.market_share,
        ];
        if parts.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::config("reward weights must be non-negative"));
        }
        let sum: f64 = parts.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(Error::config(format!(
                "reward weights must sum to 1, got {sum}"
            )));
        }
        Ok(())
    }
}

/// Per-component reward values for one repricing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RewardBreakdown {
    pub total: f64,
    pub revenue: f64,
    pub competitive: f64,
    pub satisfaction: f64,
    pub market_share: f64,
}

/// Scores a clamped price against the state it was proposed in.
#[derive(Debug, Clone, Copy)]
pub struct RewardCalculator {
    weights: RewardWeights,
}

impl RewardCalculator {
    /// Fails if the weights are inconsistent.
    pub fn new(weights: RewardWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self { weights })
    }

    /// Evaluate the reward for moving `state.current_price` to `new_price`.
    ///
    /// `demand_delta` is the observed trailing demand change from the
    /// historical series (see `observed_demand_delta`).
    pub fn evaluate(
        &self,
        state: &PricingState,
        new_price: f64,
        demand_delta: f64,
    ) -> RewardBreakdown {
        let price_change = (new_price - state.current_price) / state.current_price;

        // (a) Revenue impact: the price move itself plus the expected demand
        // response (elasticity on the move, anchored by what demand actually
        // did over the trailing window).
        let demand_change = state.price_elasticity * price_change + demand_delta;
        let revenue = price_change + demand_change;

        // (b) Competitive advantage: how far under the competitor average
        // the new price sits, as a fraction of it. Zero when untracked.
        let competitive = state
            .competitor_average()
            .map(|avg| (avg - new_price) / avg)
            .unwrap_or(0.0);

        // (c) Customer satisfaction: quality/price tradeoff — normalized
        // rating, less a pressure term when the price moved up.
        let quality = state.review_score / 5.0;
        let satisfaction = quality - price_change.max(0.0);

        // (d) Market-share proxy: blend of competitiveness and quality.
        let market_share = 0.5 * competitive + 0.5 * quality;

        let total = self.weights.revenue * revenue
            + self.weights.competitive * competitive
            + self.weights.satisfaction * satisfaction
            + self.weights.market_share * market_share;

        RewardBreakdown {
            total,
            revenue,
            competitive,
            satisfaction,
            market_share,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserTier;

    fn state() -> PricingState {
        PricingState {
            product_id: "p1".to_string(),
            current_price: 100.0,
            demand_forecast: 40.0,
            competitor_prices: vec![90.0, 95.0, 100.0],
            inventory_level: 25.0,
            hour_of_day: 10,
            day_of_week: 1,
            model_age_days: 60.0,
            review_score: 4.0,
            conversion_rate: 0.05,
            price_elasticity: -1.5,
            seasonal_factor: 1.0,
            user_tier: UserTier::Free,
        }
    }

    #[test]
    fn weights_must_sum_to_one() {
        let bad = RewardWeights {
            revenue: 0.5,
            competitive: 0.5,
            satisfaction: 0.5,
            market_share: 0.5,
        };
        assert!(matches!(
            RewardCalculator::new(bad),
            Err(Error::Configuration(_))
        ));
        assert!(RewardCalculator::new(RewardWeights::default()).is_ok());
    }

    #[test]
    fn undercutting_competitors_scores_positive_advantage() {
        let calc = RewardCalculator::new(RewardWeights::default()).unwrap();
        let under = calc.evaluate(&state(), 90.0, 0.0);
        let over = calc.evaluate(&state(), 104.0, 0.0);
        assert!(under.competitive > 0.0);
        assert!(over.competitive < 0.0);
        // Competitor avg is 95: advantage is (95 - 90) / 95.
        assert!((under.competitive - 5.0 / 95.0).abs() < 1e-12);
    }

    #[test]
    fn price_increase_reduces_satisfaction() {
        let calc = RewardCalculator::new(RewardWeights::default()).unwrap();
        let hold = calc.evaluate(&state(), 100.0, 0.0);
        let raise = calc.evaluate(&state(), 110.0, 0.0);
        assert!(raise.satisfaction < hold.satisfaction);
        // Price cuts are not "extra satisfying": pressure term floors at 0.
        let cut = calc.evaluate(&state(), 90.0, 0.0);
        assert!((cut.satisfaction - hold.satisfaction).abs() < 1e-12);
    }

    #[test]
    fn observed_demand_delta_feeds_revenue() {
        let calc = RewardCalculator::new(RewardWeights::default()).unwrap();
        let flat = calc.evaluate(&state(), 100.0, 0.0);
        let growing = calc.evaluate(&state(), 100.0, 0.2);
        assert!(
            growing.revenue > flat.revenue,
            "real demand growth must raise the revenue component"
        );
        // With no price change the revenue term is exactly the demand delta.
        assert!((growing.revenue - 0.2).abs() < 1e-12);
    }

    #[test]
    fn no_competitors_means_neutral_advantage() {
        let calc = RewardCalculator::new(RewardWeights::default()).unwrap();
        let mut s = state();
        s.competitor_prices.clear();
        let r = calc.evaluate(&s, 105.0, 0.0);
        assert_eq!(r.competitive, 0.0);
    }
}
