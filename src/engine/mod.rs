//! Trait Engine - Integration Layer
//!
//! Owns the registry, the active configuration and the pool cache, and
//! exposes the entry points a host wires to its events:
//!   1. Reward drop        → `roll_traits(item, rng, true)`
//!   2. Item tick          → `on_item_update(item, rng, authoritative)`
//!   3. Attribute query    → `apply_modifiers(item, slot, base)`
//!   4. Attack / damage    → `coordinator()` + `PenetrationState`
//!   5. Durability / knockback / tooltip → `resolver()`
//!   6. Config change      → `reload(config)`

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::compositor::{self, ModifierMultimap};
use crate::config::{ConfigError, ItemEligibility, TraitConfig};
use crate::effect::EquipSlot;
use crate::logging::TimingSpan;
use crate::penetration::PenetrationCoordinator;
use crate::pool::{Assignment, CombinationPool, CombinationPoolBuilder};
use crate::resolver::EffectResolver;
use crate::selector::{self, SelectError};
use crate::store::{self, TraitHolder};
use crate::traits::{Trait, TraitLoadReport, TraitRegistry};

/// Outcome of loading trait definitions into the registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadSummary {
    pub loaded: usize,
    pub skipped: usize,
}

pub struct TraitEngine {
    registry: TraitRegistry,
    config: TraitConfig,
    eligibility: ItemEligibility,
    pools: CombinationPoolBuilder,
    /// Traits from registered packs, re-applied on top of every reload
    pack_traits: Vec<Trait>,
}

impl TraitEngine {
    /// Engine with the config's embedded traits registered
    pub fn new(config: TraitConfig) -> Result<Self, ConfigError> {
        let mut engine = Self {
            registry: TraitRegistry::new(),
            eligibility: config.eligibility(),
            config: TraitConfig::default(),
            pools: CombinationPoolBuilder::new(),
            pack_traits: Vec::new(),
        };
        engine.reload(config)?;
        Ok(engine)
    }

    /// Replaces config and registry wholesale, then re-registers pack traits
    /// over the config's own.
    ///
    /// Nothing changes when `config` fails validation. The pool is
    /// invalidated, not rebuilt. The summary counts the config's traits.
    pub fn reload(&mut self, config: TraitConfig) -> Result<ReloadSummary, ConfigError> {
        let _span = TimingSpan::new("trait_reload");
        config.validate()?;
        let report = config.load_traits();
        let summary = ReloadSummary {
            loaded: report.traits.len(),
            skipped: report.skipped.len(),
        };

        self.registry.purge_all();
        for loaded in report.traits {
            self.registry.register(loaded);
        }
        for pack_trait in &self.pack_traits {
            self.registry.register(pack_trait.clone());
        }
        self.eligibility = config.eligibility();
        self.config = config;
        self.pools.invalidate();

        info!(
            loaded = summary.loaded,
            skipped = summary.skipped,
            packs = self.pack_traits.len(),
            "trait registry reloaded"
        );
        Ok(summary)
    }

    /// Registers an extra trait pack on top of the current registry.
    /// The pack stays registered across later reloads.
    pub fn register_pack(&mut self, report: TraitLoadReport) -> ReloadSummary {
        let summary = ReloadSummary {
            loaded: report.traits.len(),
            skipped: report.skipped.len(),
        };
        for loaded in report.traits {
            self.registry.register(loaded.clone());
            self.pack_traits.push(loaded);
        }
        self.pools.invalidate();
        summary
    }

    /// Forgets registered packs. Their traits leave the registry on the next reload.
    pub fn clear_packs(&mut self) {
        self.pack_traits.clear();
    }

    pub fn registry(&self) -> &TraitRegistry {
        &self.registry
    }

    pub fn config(&self) -> &TraitConfig {
        &self.config
    }

    /// Current pool, built on first use after a registry change
    pub fn pool(&mut self) -> Arc<CombinationPool> {
        self.pools.get_or_build(&self.registry, &self.config.weights)
    }

    pub fn resolver(&self) -> EffectResolver<'_> {
        EffectResolver::new(&self.registry)
    }

    pub fn coordinator(&self) -> PenetrationCoordinator<'_> {
        PenetrationCoordinator::new(self.resolver())
    }

    /// Whether this item may be rolled in this context
    pub fn can_roll<H: TraitHolder + ?Sized>(&self, item: &H, from_reward: bool) -> bool {
        (from_reward || !self.config.general.rewards_only) && self.eligibility.allows(item)
    }

    /// Draws an assignment and writes it onto the item.
    ///
    /// Returns `Ok(None)` when the item is not eligible in this context.
    pub fn roll_traits<H, R>(
        &mut self,
        item: &mut H,
        rng: &mut R,
        from_reward: bool,
    ) -> Result<Option<Assignment>, SelectError>
    where
        H: TraitHolder + ?Sized,
        R: Rng + ?Sized,
    {
        if !self.can_roll(item, from_reward) {
            return Ok(None);
        }
        let pool = self.pool();
        let assignment = selector::draw(&pool, rng, from_reward)?.clone();
        apply_assignment(item, &assignment);
        debug!(
            item = item.item_id(),
            slots = assignment.occupied(),
            from_reward,
            "rolled traits"
        );
        Ok(Some(assignment))
    }

    /// Rolls items that have never been rolled, on the authoritative side only
    pub fn on_item_update<H, R>(
        &mut self,
        item: &mut H,
        rng: &mut R,
        authoritative: bool,
    ) -> Result<Option<Assignment>, SelectError>
    where
        H: TraitHolder + ?Sized,
        R: Rng + ?Sized,
    {
        if !authoritative || store::has_trait_data(item) || store::is_rolled(item) {
            return Ok(None);
        }
        self.roll_traits(item, rng, false)
    }

    /// Folds the item's trait modifiers for `slot` into the host's collection
    pub fn apply_modifiers<H, M>(&self, item: &H, slot: EquipSlot, base: &mut M)
    where
        H: TraitHolder + ?Sized,
        M: ModifierMultimap + ?Sized,
    {
        let engine = self.resolver().attribute_modifiers(item, slot);
        compositor::fold(base, &engine);
    }
}

/// Writes every occupied slot onto the item and marks it rolled
pub fn apply_assignment<H: TraitHolder + ?Sized>(item: &mut H, assignment: &Assignment) {
    for slot in assignment.slots() {
        store::set(item, &slot.trait_id, slot.level);
    }
    store::mark_rolled(item);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::AttributeModifier;
    use crate::level::LevelTier;
    use crate::store::ItemStack;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn test_engine() -> TraitEngine {
        TraitEngine::new(TraitConfig::default()).unwrap()
    }

    #[test]
    fn test_engine_loads_default_traits() {
        let engine = test_engine();
        assert_eq!(engine.registry().len(), 6);
        assert!(engine.registry().lookup("keen").is_some());
    }

    #[test]
    fn test_rewards_only_blocks_non_reward_rolls() {
        let mut engine = test_engine();
        let mut item = ItemStack::new("iron_sword");
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        assert_eq!(engine.roll_traits(&mut item, &mut rng, false), Ok(None));
        assert!(!store::is_rolled(&item));
        assert!(engine.roll_traits(&mut item, &mut rng, true).unwrap().is_some());
        assert!(store::is_rolled(&item));
    }

    #[test]
    fn test_ineligible_item_never_rolls() {
        let mut engine = test_engine();
        let mut stick = ItemStack::new("stick").with_default_eligible(false);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        assert_eq!(engine.roll_traits(&mut stick, &mut rng, true), Ok(None));
    }

    #[test]
    fn test_roll_writes_assignment() {
        let mut engine = test_engine();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(99);
        for _ in 0..200 {
            let mut item = ItemStack::new("iron_sword");
            let assignment = engine.roll_traits(&mut item, &mut rng, true).unwrap().unwrap();
            for slot in assignment.slots() {
                assert_eq!(store::level_of(&item, &slot.trait_id), slot.level);
            }
            assert_eq!(store::get(&item).len(), assignment.occupied());
        }
    }

    #[test]
    fn test_item_update_rolls_once() {
        let mut config = TraitConfig::default();
        config.general.rewards_only = false;
        let mut engine = TraitEngine::new(config).unwrap();
        let mut item = ItemStack::new("iron_sword");
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(4);

        assert_eq!(engine.on_item_update(&mut item, &mut rng, false), Ok(None));
        assert!(engine.on_item_update(&mut item, &mut rng, true).unwrap().is_some());
        assert_eq!(engine.on_item_update(&mut item, &mut rng, true), Ok(None));
    }

    #[test]
    fn test_reload_invalidates_pool() {
        let mut engine = test_engine();
        let before = engine.pool();

        let mut config = TraitConfig::default();
        config.traits = vec![json!({ "id": "solo", "display_text": "Solo" })];
        let summary = engine.reload(config).unwrap();
        assert_eq!(summary, ReloadSummary { loaded: 1, skipped: 0 });

        let after = engine.pool();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.len(), 5);
        assert!(engine.registry().lookup("keen").is_none());
    }

    #[test]
    fn test_invalid_reload_keeps_previous_state() {
        let mut engine = test_engine();
        let mut config = TraitConfig::default();
        config.weights.none_probability = 1.5;
        config.traits.clear();
        assert!(engine.reload(config).is_err());
        assert_eq!(engine.registry().len(), 6);
        assert_eq!(engine.config().weights.none_probability, 0.75);
    }

    #[test]
    fn test_register_pack_adds_traits() {
        let mut engine = test_engine();
        let report = crate::traits::parse_json_records(&[
            json!({ "id": "swift", "display_text": "Swift" }),
            json!({ "id": "" }),
        ]);
        let summary = engine.register_pack(report);
        assert_eq!(summary, ReloadSummary { loaded: 1, skipped: 1 });
        assert_eq!(engine.registry().len(), 7);
    }

    #[test]
    fn test_pack_survives_reload() {
        let mut engine = test_engine();
        engine.register_pack(crate::traits::parse_json_records(&[
            json!({ "id": "swift", "display_text": "Swift" }),
        ]));

        let summary = engine.reload(TraitConfig::default()).unwrap();
        assert_eq!(summary.loaded, 6);
        assert!(engine.registry().lookup("swift").is_some());
        assert_eq!(engine.registry().len(), 7);

        engine.clear_packs();
        engine.reload(TraitConfig::default()).unwrap();
        assert!(engine.registry().lookup("swift").is_none());
    }

    #[test]
    fn test_apply_modifiers_folds_mighty() {
        let engine = test_engine();
        let mut item = ItemStack::new("iron_sword");
        store::set(&mut item, "mighty", LevelTier::Legendary);

        let mut base: BTreeMap<String, Vec<AttributeModifier>> = BTreeMap::new();
        base.insert(
            "attack_damage".to_string(),
            vec![AttributeModifier::flat("weapon", 4.0)],
        );
        engine.apply_modifiers(&item, EquipSlot::MainHand, &mut base);
        // (4 + 2) * 1.25
        assert!((base["attack_damage"][0].amount - 7.5).abs() < 1e-9);

        engine.apply_modifiers(&item, EquipSlot::Feet, &mut base);
        assert_eq!(base.len(), 1);
    }
}
