//! Monte-Carlo Balance Simulation
//!
//! Draws many rolls from a pool snapshot to check that the configured weights
//! produce the intended distribution: how often nothing is granted, which
//! tiers primaries land on, and how many slots a roll fills. Reward and
//! standard contexts are simulated separately. Uses rayon across CPU cores.

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

use crate::level::LevelTier;
use crate::pool::{CombinationPool, PoolSummary};
use crate::selector::{self, SelectError};

/// Configuration for a simulation run
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Draws per context
    pub draws: u64,
    /// Independent RNG streams; fixed so results do not depend on thread count
    pub workers: u64,
    pub base_seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            draws: 100_000,
            workers: 64,
            base_seed: 42,
        }
    }
}

/// Distribution observed in one context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextReport {
    pub draws: u64,
    pub empty_rate: f64,
    pub mean_slots: f64,
    /// (tier name, share of draws whose primary sits at that tier)
    pub primary_tiers: Vec<(String, f64)>,
}

/// Results of a balance simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceReport {
    pub pool: PoolSummary,
    pub standard: ContextReport,
    pub reward: ContextReport,
}

impl BalanceReport {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    draws: u64,
    empty: u64,
    slots: u64,
    primaries: [u64; 5],
}

impl Tally {
    fn merge(self, other: Tally) -> Tally {
        let mut primaries = self.primaries;
        for (total, add) in primaries.iter_mut().zip(other.primaries) {
            *total += add;
        }
        Tally {
            draws: self.draws + other.draws,
            empty: self.empty + other.empty,
            slots: self.slots + other.slots,
            primaries,
        }
    }

    fn report(&self) -> ContextReport {
        let share = |n: u64| {
            if self.draws == 0 {
                0.0
            } else {
                n as f64 / self.draws as f64
            }
        };
        ContextReport {
            draws: self.draws,
            empty_rate: share(self.empty),
            mean_slots: share(self.slots),
            primary_tiers: LevelTier::LEVELS
                .iter()
                .map(|level| (level.name().to_string(), share(self.primaries[level.ordinal()])))
                .collect(),
        }
    }
}

/// Seed for one worker stream, derived from the base seed
fn worker_seed(base_seed: u64, worker: u64, is_reward: bool) -> u64 {
    let mut hasher = Sha3_256::new();
    hasher.update(base_seed.to_le_bytes());
    hasher.update(worker.to_le_bytes());
    hasher.update([u8::from(is_reward)]);
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

fn simulate_context(
    pool: &CombinationPool,
    config: &SimConfig,
    is_reward: bool,
) -> Result<Tally, SelectError> {
    let workers = config.workers.max(1);
    let per_worker = config.draws / workers;
    let remainder = config.draws % workers;

    (0..workers)
        .into_par_iter()
        .map(|worker| -> Result<Tally, SelectError> {
            let mut rng =
                Xoshiro256PlusPlus::seed_from_u64(worker_seed(config.base_seed, worker, is_reward));
            let count = per_worker + u64::from(worker < remainder);
            let mut tally = Tally::default();
            for _ in 0..count {
                let assignment = selector::draw(pool, &mut rng, is_reward)?;
                tally.draws += 1;
                tally.slots += assignment.occupied() as u64;
                match &assignment.primary {
                    Some(primary) => tally.primaries[primary.level.ordinal()] += 1,
                    None => tally.empty += 1,
                }
            }
            Ok(tally)
        })
        .try_reduce(Tally::default, |a, b| Ok(a.merge(b)))
}

/// Run the simulation for both contexts
pub fn simulate(pool: &CombinationPool, config: &SimConfig) -> Result<BalanceReport, SelectError> {
    let standard = simulate_context(pool, config, false)?;
    let reward = simulate_context(pool, config, true)?;
    Ok(BalanceReport {
        pool: pool.summary(),
        standard: standard.report(),
        reward: reward.report(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WeightsConfig;
    use crate::effect::EffectProfile;
    use crate::pool::build_pool;
    use crate::traits::{Trait, TraitRegistry};

    fn pool() -> CombinationPool {
        let mut registry = TraitRegistry::new();
        registry.register(Trait::uniform("keen", EffectProfile::default()));
        registry.register(Trait::uniform("sturdy", EffectProfile::default()));
        build_pool(&registry, &WeightsConfig::default())
    }

    fn small() -> SimConfig {
        SimConfig {
            draws: 20_000,
            workers: 8,
            base_seed: 7,
        }
    }

    #[test]
    fn test_draw_counts() {
        let report = simulate(&pool(), &SimConfig { draws: 1001, ..small() }).unwrap();
        assert_eq!(report.standard.draws, 1001);
        assert_eq!(report.reward.draws, 1001);
    }

    #[test]
    fn test_deterministic() {
        let a = simulate(&pool(), &small()).unwrap();
        let b = simulate(&pool(), &small()).unwrap();
        assert_eq!(a.standard.empty_rate, b.standard.empty_rate);
        assert_eq!(a.reward.mean_slots, b.reward.mean_slots);
    }

    #[test]
    fn test_reward_rolls_grant_more() {
        let report = simulate(&pool(), &small()).unwrap();
        assert!(report.reward.empty_rate < report.standard.empty_rate);
        let shares: f64 = report.standard.primary_tiers.iter().map(|(_, s)| s).sum();
        assert!((shares + report.standard.empty_rate - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_weight_pool_errors() {
        let weights = WeightsConfig {
            uncommon: 0,
            none_probability: 0.0,
            ..WeightsConfig::default()
        };
        let pool = build_pool(&TraitRegistry::new(), &weights);
        assert!(matches!(simulate(&pool, &small()), Err(SelectError::ZeroTotalWeight)));
    }

    #[test]
    fn test_worker_seeds_differ() {
        assert_ne!(worker_seed(42, 0, false), worker_seed(42, 1, false));
        assert_ne!(worker_seed(42, 0, false), worker_seed(42, 0, true));
        assert_eq!(worker_seed(42, 3, true), worker_seed(42, 3, true));
    }
}
