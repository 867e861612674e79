//! Deterministic experiment routing shared by both engines.
//!
//! Assignment is a pure hash of `(epoch, experiment_id, subject_id)`: the
//! same subject always lands in the same arm for the lifetime of an
//! experiment epoch, and bumping the epoch is the only way to reshuffle.
//! A lightweight per-arm outcome tally supports comparing arms without any
//! external analytics dependency.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Two-arm experiment assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentArm {
    Control,
    Treatment,
}

/// Three-arm pricing experiment group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingGroup {
    Control,
    Aggressive,
    Conservative,
}

impl PricingGroup {
    /// Scale applied to the optimized multiplier for this arm.
    pub fn multiplier_scale(&self) -> f64 {
        match self {
            Self::Control => 1.0,
            Self::Aggressive => 1.1,
            Self::Conservative => 0.9,
        }
    }
}

/// Aggregated outcomes for one arm of one experiment.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ArmStats {
    pub samples: u64,
    pub total_outcome: f64,
}

impl ArmStats {
    /// Mean recorded outcome, 0 with no samples.
    pub fn mean_outcome(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.total_outcome / self.samples as f64
        }
    }
}

/// Deterministic A/B router.
///
/// Stateless for assignment; the outcome tally is the only mutable state and
/// is guarded by a single `RwLock` (recorded outcomes are low-rate relative
/// to assignment reads).
#[derive(Debug)]
pub struct ExperimentRouter {
    epoch: u64,
    outcomes: RwLock<HashMap<(String, ExperimentArm), ArmStats>>,
}

impl ExperimentRouter {
    /// Router for the given experiment epoch.
    pub fn new(epoch: u64) -> Self {
        Self {
            epoch,
            outcomes: RwLock::new(HashMap::new()),
        }
    }

    /// Current epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Assign `subject_id` (a user or product id) to an arm of
    /// `experiment_id`. Pure function of (epoch, experiment, subject).
    pub fn assign(&self, experiment_id: &str, subject_id: &str) -> ExperimentArm {
        let mut h = Fnv1a::new();
        h.write(&self.epoch.to_le_bytes());
        h.write(experiment_id.as_bytes());
        // Separator so ("ab", "c") and ("a", "bc") hash differently.
        h.write(&[0xff]);
        h.write(subject_id.as_bytes());
        if h.finish() >> 63 == 0 {
            ExperimentArm::Control
        } else {
            ExperimentArm::Treatment
        }
    }

    /// Record an observed outcome (revenue delta, click-through, ...) for an
    /// arm of an experiment.
    pub fn record_outcome(&self, experiment_id: &str, arm: ExperimentArm, outcome: f64) {
        let mut guard = self
            .outcomes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let stats = guard
            .entry((experiment_id.to_string(), arm))
            .or_default();
        stats.samples += 1;
        stats.total_outcome += outcome;
    }

    /// Tally for one arm of an experiment.
    pub fn arm_stats(&self, experiment_id: &str, arm: ExperimentArm) -> ArmStats {
        let guard = self
            .outcomes
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard
            .get(&(experiment_id.to_string(), arm))
            .copied()
            .unwrap_or_default()
    }

    /// Outcome difference (treatment − control) for an experiment.
    pub fn outcome_difference(&self, experiment_id: &str) -> f64 {
        self.arm_stats(experiment_id, ExperimentArm::Treatment)
            .mean_outcome()
            - self
                .arm_stats(experiment_id, ExperimentArm::Control)
                .mean_outcome()
    }
}

/// FNV-1a, 64-bit, with an avalanche finalizer. Hand-rolled so arm
/// assignment is stable across Rust releases and processes, unlike
/// `DefaultHasher`.
struct Fnv1a(u64);

impl Fnv1a {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    fn new() -> Self {
        Self(Self::OFFSET)
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= u64::from(b);
            self.0 = self.0.wrapping_mul(Self::PRIME);
        }
    }

    /// Finalized hash. FNV's odd-prime multiply never carries input entropy
    /// downward, so the raw state's low bits are just input-byte parity; the
    /// fmix64 steps avalanche every input bit across the whole word before
    /// any single bit decides an arm.
    fn finish(&self) -> u64 {
        let mut h = self.0;
        h ^= h >> 33;
        h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
        h ^= h >> 33;
        h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
        h ^= h >> 33;
        h
    }
}
