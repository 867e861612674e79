//! Hard, competitive, and fairness pricing rules.
//!
//! Clamps apply in a fixed order — hard min/max, daily-change band,
//! competitor buffer, fairness tier discount — and the order is load-bearing:
//! the fairness discount runs last so no other clamp can undo it, and the
//! competitor buffer runs after the daily band so a competitor move cannot
//! drag the price outside the per-day change limit that was already applied.

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::types::UserTier;

/// Per-product pricing rules, owned by catalog configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PricingConstraints {
    pub min_price: f64,
    pub max_price: f64,
    /// Largest allowed |Δprice| / currentPrice per day
    pub max_daily_change_fraction: f64,
    /// Allowed band around the competitor average, as a fraction of it
    pub competitor_buffer_fraction: f64,
    /// Fairness discount for premium users (fraction of price)
    pub premium_discount: f64,
    /// Fairness discount for enterprise users (fraction of price)
    pub enterprise_discount: f64,
}

impl PricingConstraints {
    /// Sensible storefront defaults around a list price.
    pub fn around(min_price: f64, max_price: f64) -> Self {
        Self {
            min_price,
            max_price,
            max_daily_change_fraction: 0.10,
            competitor_buffer_fraction: 0.10,
            premium_discount: 0.03,
            enterprise_discount: 0.08,
        }
    }

    /// Reject inconsistent rule sets before they reach the enforcer.
    pub fn validate(&self) -> Result<()> {
        if !self.min_price.is_finite() || !self.max_price.is_finite() || self.min_price <= 0.0 {
            return Err(Error::config("price bounds must be finite and positive"));
        }
        if self.min_price > self.max_price {
            return Err(Error::config(format!(
                "min_price {} exceeds max_price {}",
                self.min_price, self.max_price
            )));
        }
        if !(0.0..1.0).contains(&self.max_daily_change_fraction)
            || !(0.0..1.0).contains(&self.competitor_buffer_fraction)
        {
            return Err(Error::config(
                "change and buffer fractions must lie in [0, 1)",
            ));
        }
        // Fairness must be monotone non-increasing free → premium → enterprise.
        if self.premium_discount < 0.0 || self.enterprise_discount < self.premium_discount {
            return Err(Error::config(
                "tier discounts must satisfy 0 <= premium <= enterprise",
            ));
        }
        Ok(())
    }

    /// Discount fraction for a tier. Free pays list.
    pub fn tier_discount(&self, tier: UserTier) -> f64 {
        match tier {
            UserTier::Free => 0.0,
            UserTier::Premium => self.premium_discount,
            UserTier::Enterprise => self.enterprise_discount,
        }
    }
}

/// Which rules fired while clamping a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClampRule {
    HardFloor,
    HardCeiling,
    DailyChange,
    CompetitorBuffer,
    FairnessDiscount,
}

impl ClampRule {
    /// Short label for decision reasoning strings.
    pub fn label(&self) -> &'static str {
        match self {
            Self::HardFloor => "hard floor",
            Self::HardCeiling => "hard ceiling",
            Self::DailyChange => "daily change limit",
            Self::CompetitorBuffer => "competitor buffer",
            Self::FairnessDiscount => "tier discount",
        }
    }
}

/// Result of running a proposal through the enforcer.
#[derive(Debug, Clone)]
pub struct ClampOutcome {
    /// Final price including the fairness discount
    pub price: f64,
    /// Price after the market clamps but before the fairness discount
    pub pre_fairness_price: f64,
    /// Rules that changed the price, in application order
    pub applied: Vec<ClampRule>,
}

/// Clamp `proposed` against the rules, in the fixed order documented above.
pub fn enforce(
    proposed: f64,
    current_price: f64,
    competitor_prices: &[f64],
    tier: UserTier,
    constraints: &PricingConstraints,
) -> ClampOutcome {
    let mut price = proposed;
    let mut applied = Vec::new();

    // (1) Hard bounds.
    if price < constraints.min_price {
        price = constraints.min_price;
        applied.push(ClampRule::HardFloor);
    } else if price > constraints.max_price {
        price = constraints.max_price;
        applied.push(ClampRule::HardCeiling);
    }

    // (2) Daily change band around the current price.
    let band = current_price * constraints.max_daily_change_fraction;
    let daily_clamped = price.clamp(current_price - band, current_price + band);
    if daily_clamped != price {
        price = daily_clamped;
        applied.push(ClampRule::DailyChange);
    }

    // (3) Competitor buffer, only when competitors are tracked.
    if !competitor_prices.is_empty() {
        let avg = competitor_prices.iter().sum::<f64>() / competitor_prices.len() as f64;
        let buffer = avg * constraints.competitor_buffer_fraction;
        let buffered = price.clamp(avg - buffer, avg + buffer);
        if buffered != price {
            price = buffered;
            applied.push(ClampRule::CompetitorBuffer);
        }
    }

    let pre_fairness_price = price;

    // (4) Fairness discount, last, so nothing overrides it.
    let discount = constraints.tier_discount(tier);
    if discount > 0.0 {
        price *= 1.0 - discount;
        applied.push(ClampRule::FairnessDiscount);
    }

    ClampOutcome {
        price,
        pre_fairness_price,
        applied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraints() -> PricingConstraints {
        PricingConstraints::around(80.0, 150.0)
    }

    #[test]
    fn rejects_inverted_bounds() {
        let mut c = constraints();
        c.min_price = 200.0;
        assert!(c.validate().is_err());
        assert!(constraints().validate().is_ok());
    }

    #[test]
    fn rejects_non_monotone_discounts() {
        let mut c = constraints();
        c.premium_discount = 0.10;
        c.enterprise_discount = 0.05;
        assert!(c.validate().is_err());
    }

    #[test]
    fn clamp_order_daily_then_competitor() {
        // Current 100, daily band [90, 110], competitors
        // avg 95 with 10% buffer → [85.5, 104.5]. Intersection [90, 104.5].
        let competitors = [90.0, 95.0, 100.0];
        let c = constraints();

        // Aggressive raise 120 → ceiling none, daily clamps to 110,
        // buffer clamps to 104.5.
        let up = enforce(120.0, 100.0, &competitors, UserTier::Free, &c);
        assert!((up.pre_fairness_price - 104.5).abs() < 1e-9);
        assert_eq!(
            up.applied,
            vec![ClampRule::DailyChange, ClampRule::CompetitorBuffer]
        );

        // Deep discount 80 → daily clamps to 90, inside the buffer.
        let down = enforce(80.0, 100.0, &competitors, UserTier::Free, &c);
        assert!((down.pre_fairness_price - 90.0).abs() < 1e-9);

        // Every discrete action lands in [90, 104.5] pre-fairness.
        for mult in [0.8, 0.9, 1.0, 1.1, 1.2] {
            let out = enforce(100.0 * mult, 100.0, &competitors, UserTier::Free, &c);
            assert!(
                (90.0..=104.5).contains(&out.pre_fairness_price),
                "multiplier {mult} escaped the clamp intersection: {}",
                out.pre_fairness_price
            );
        }
    }

    #[test]
    fn competitor_clamp_skipped_without_competitors() {
        let out = enforce(120.0, 100.0, &[], UserTier::Free, &constraints());
        assert!((out.price - 110.0).abs() < 1e-9);
        assert_eq!(out.applied, vec![ClampRule::DailyChange]);
    }

    #[test]
    fn fairness_is_applied_last_and_monotone() {
        let competitors = [90.0, 95.0, 100.0];
        let c = constraints();
        let free = enforce(110.0, 100.0, &competitors, UserTier::Free, &c);
        let premium = enforce(110.0, 100.0, &competitors, UserTier::Premium, &c);
        let enterprise = enforce(110.0, 100.0, &competitors, UserTier::Enterprise, &c);

        assert!(premium.price <= free.price);
        assert!(enterprise.price <= premium.price);
        // Same market price for all tiers; only the discount differs.
        assert_eq!(free.pre_fairness_price, premium.pre_fairness_price);
        assert_eq!(premium.applied.last(), Some(&ClampRule::FairnessDiscount));
    }

    #[test]
    fn hard_bounds_fire_first() {
        let mut c = constraints();
        c.max_daily_change_fraction = 0.9;
        let out = enforce(500.0, 140.0, &[], UserTier::Free, &c);
        assert_eq!(out.applied.first(), Some(&ClampRule::HardCeiling));
        assert!(out.price <= c.max_price);
    }
}
