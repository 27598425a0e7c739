//! Combination Pool
//!
//! Enumerates every valid trait/tier assignment for the current registry and
//! prices each one for weighted selection:
//! - A primary trait at any grantable tier
//! - Up to one secondary and two tertiary traits at tiers derived from the primary
//! - Conflict rules checked pairwise across all occupied slots
//! - One empty assignment sized from the configured "nothing" probability
//!
//! Builds are memoized by [`CombinationPoolBuilder`] and only invalidated,
//! never rebuilt eagerly, when the registry changes.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::WeightsConfig;
use crate::constants::{BASE_SLOT_COUNT, DEFAULT_TRAIT_WEIGHT};
use crate::level::LevelTier;
use crate::logging::TimingSpan;
use crate::traits::{Trait, TraitRegistry};

/// One occupied slot of an assignment
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TraitSlot {
    pub trait_id: String,
    pub level: LevelTier,
}

/// Dedup key: primary, secondary, first tertiary, second tertiary
pub type AssignmentKey = [Option<TraitSlot>; 4];

/// A concrete combination of up to four (trait, tier) slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub primary: Option<TraitSlot>,
    pub secondary: Option<TraitSlot>,
    pub tertiary_first: Option<TraitSlot>,
    pub tertiary_second: Option<TraitSlot>,
    pub weight: u64,
}

impl Assignment {
    fn from_key(key: AssignmentKey, weight: u64) -> Self {
        let [primary, secondary, tertiary_first, tertiary_second] = key;
        Self {
            primary,
            secondary,
            tertiary_first,
            tertiary_second,
            weight,
        }
    }

    /// The "grants nothing" assignment
    pub fn empty(weight: u64) -> Self {
        Self::from_key(Default::default(), weight)
    }

    pub fn key(&self) -> AssignmentKey {
        [
            self.primary.clone(),
            self.secondary.clone(),
            self.tertiary_first.clone(),
            self.tertiary_second.clone(),
        ]
    }

    /// Occupied slots in slot order
    pub fn slots(&self) -> impl Iterator<Item = &TraitSlot> {
        [
            &self.primary,
            &self.secondary,
            &self.tertiary_first,
            &self.tertiary_second,
        ]
        .into_iter()
        .flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.slots().next().is_none()
    }

    pub fn occupied(&self) -> usize {
        self.slots().count()
    }

    pub fn highest_level(&self) -> LevelTier {
        self.slots()
            .map(|slot| slot.level)
            .max()
            .unwrap_or(LevelTier::None)
    }
}

/// The enumerated, weighted set of assignments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinationPool {
    entries: Vec<Assignment>,
    total_weight: u64,
}

/// Compact description of a pool for reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSummary {
    pub entries: usize,
    pub total_weight: u64,
    pub empty_weight: u64,
    /// (tier name, entries whose primary sits at that tier, their summed weight)
    pub primaries: Vec<(String, usize, u64)>,
}

impl CombinationPool {
    /// Entries in draw order: non-empty assignments by key, the empty one last
    pub fn entries(&self) -> &[Assignment] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn empty_assignment(&self) -> Option<&Assignment> {
        self.entries.last().filter(|a| a.is_empty())
    }

    pub fn summary(&self) -> PoolSummary {
        let primaries = LevelTier::LEVELS
            .iter()
            .map(|level| {
                let (count, weight) = self
                    .entries
                    .iter()
                    .filter(|a| a.primary.as_ref().is_some_and(|p| p.level == *level))
                    .fold((0usize, 0u64), |(c, w), a| {
                        (c + 1, w.saturating_add(a.weight))
                    });
                (level.name().to_string(), count, weight)
            })
            .collect();

        PoolSummary {
            entries: self.entries.len(),
            total_weight: self.total_weight,
            empty_weight: self.empty_assignment().map_or(0, |a| a.weight),
            primaries,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Weight of the baseline (empty-cost) roll
fn base_weight(weights: &WeightsConfig) -> f64 {
    weights.uncommon as f64 * (DEFAULT_TRAIT_WEIGHT as u64 * BASE_SLOT_COUNT) as f64
}

/// Share of the baseline one occupied slot costs
fn slot_cost(weights: &WeightsConfig, trait_def: &Trait, level: LevelTier) -> f64 {
    (weights.tier_weight(level) as f64 * trait_def.weight() as f64)
        / (weights.uncommon as f64 * DEFAULT_TRAIT_WEIGHT as f64)
}

fn empty_weight(weights: &WeightsConfig) -> u64 {
    let p = weights.none_probability;
    (base_weight(weights) * p / (1.0 - p)).floor() as u64
}

fn assignment_weight(weights: &WeightsConfig, slots: &[(&Trait, LevelTier)]) -> u64 {
    let total_cost: f64 = slots
        .iter()
        .map(|(trait_def, level)| slot_cost(weights, trait_def, *level))
        .product();
    ((base_weight(weights) * total_cost).round() as u64).max(1)
}

/// All four traits may share an item
fn can_apply(primary: &Trait, others: &[Option<&Trait>; 3]) -> bool {
    let occupied: Vec<&Trait> = std::iter::once(primary)
        .chain(others.iter().flatten().copied())
        .collect();
    occupied.iter().enumerate().all(|(i, a)| {
        occupied[i + 1..]
            .iter()
            .all(|b| a.can_be_applied_with(b))
    })
}

struct PoolCollector<'w> {
    weights: &'w WeightsConfig,
    entries: BTreeMap<AssignmentKey, u64>,
}

impl PoolCollector<'_> {
    fn insert(&mut self, slots: [Option<(&Trait, LevelTier)>; 4]) {
        let occupied: Vec<(&Trait, LevelTier)> = slots
            .iter()
            .flatten()
            .filter(|(_, level)| !level.is_none())
            .copied()
            .collect();
        if occupied.is_empty() {
            return;
        }
        let key: AssignmentKey = slots.map(|slot| {
            slot.filter(|(_, level)| !level.is_none())
                .map(|(trait_def, level)| TraitSlot {
                    trait_id: trait_def.id().to_string(),
                    level,
                })
        });
        let weight = assignment_weight(self.weights, &occupied);
        self.entries.entry(key).or_insert(weight);
    }

    /// Inserts every tier permutation of the given identities
    fn permute(
        &mut self,
        primary: (&Trait, LevelTier),
        levels: &[LevelTier],
        secondary: Option<&Trait>,
        tertiary_first: Option<&Trait>,
        tertiary_second: Option<&Trait>,
    ) {
        if !can_apply(primary.0, &[secondary, tertiary_first, tertiary_second]) {
            return;
        }
        let none = [LevelTier::None];
        let first_levels: &[LevelTier] = if tertiary_first.is_some() { levels } else { &none };
        let second_levels: &[LevelTier] = if tertiary_second.is_some() { levels } else { &none };

        for &sec_level in levels {
            for &first_level in first_levels {
                if first_level > sec_level {
                    continue;
                }
                for &second_level in second_levels {
                    if second_level > sec_level {
                        continue;
                    }
                    self.insert([
                        Some(primary),
                        secondary.map(|t| (t, sec_level)),
                        tertiary_first.map(|t| (t, first_level)),
                        tertiary_second.map(|t| (t, second_level)),
                    ]);
                }
            }
        }
    }

    fn add_all_for_primary(&mut self, registry: &TraitRegistry, primary: &Trait, level: LevelTier) {
        let sec_level = level.secondary();
        let first_level = level.tertiary_first();
        let second_level = level.tertiary_second();

        let mut levels = vec![sec_level];
        for tertiary in [first_level, second_level] {
            if !tertiary.is_none() && !levels.contains(&tertiary) {
                levels.push(tertiary);
            }
        }

        self.permute((primary, level), &levels, None, None, None);

        if first_level.is_none() {
            for secondary in registry.iter().map(Arc::as_ref) {
                if can_apply(primary, &[Some(secondary), None, None]) {
                    self.insert([Some((primary, level)), Some((secondary, sec_level)), None, None]);
                }
            }
            return;
        }

        for secondary in registry.iter().map(Arc::as_ref) {
            if !secondary.can_be_applied_with(primary) {
                continue;
            }
            self.permute((primary, level), &levels, Some(secondary), None, None);
            for tertiary in registry.iter().map(Arc::as_ref) {
                if !can_apply(primary, &[Some(secondary), Some(tertiary), None]) {
                    continue;
                }
                self.permute((primary, level), &levels, Some(secondary), Some(tertiary), None);
                for tertiary_second in registry.iter().map(Arc::as_ref) {
                    self.permute(
                        (primary, level),
                        &levels,
                        Some(secondary),
                        Some(tertiary),
                        Some(tertiary_second),
                    );
                }
            }
        }
    }
}

/// Enumerates and prices every valid assignment for `registry`
pub fn build_pool(registry: &TraitRegistry, weights: &WeightsConfig) -> CombinationPool {
    let _span = TimingSpan::new("pool_build");

    let mut collector = PoolCollector {
        weights,
        entries: BTreeMap::new(),
    };
    for trait_def in registry.iter() {
        for level in LevelTier::LEVELS {
            collector.add_all_for_primary(registry, trait_def, level);
        }
    }

    let mut entries: Vec<Assignment> = collector
        .entries
        .into_iter()
        .map(|(key, weight)| Assignment::from_key(key, weight))
        .collect();
    entries.push(Assignment::empty(empty_weight(weights)));

    let total_weight = entries
        .iter()
        .fold(0u64, |acc, a| acc.saturating_add(a.weight));

    info!(
        traits = registry.len(),
        entries = entries.len(),
        total_weight,
        "combination pool built"
    );

    CombinationPool {
        entries,
        total_weight,
    }
}

/// Memoizes the pool until told the registry changed
#[derive(Debug, Default)]
pub struct CombinationPoolBuilder {
    cached: Option<Arc<CombinationPool>>,
}

impl CombinationPoolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached pool, building it first if needed
    pub fn get_or_build(
        &mut self,
        registry: &TraitRegistry,
        weights: &WeightsConfig,
    ) -> Arc<CombinationPool> {
        if let Some(pool) = &self.cached {
            return Arc::clone(pool);
        }
        let pool = Arc::new(build_pool(registry, weights));
        self.cached = Some(Arc::clone(&pool));
        pool
    }

    /// Drops the cached pool; the next access rebuilds it
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    pub fn is_cached(&self) -> bool {
        self.cached.is_some()
    }
}
