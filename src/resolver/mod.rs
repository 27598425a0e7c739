//! Effect Resolver
//!
//! Turns an item's persisted traits into the numbers the host asks for:
//! - Knockback multiplier (product of factors)
//! - Penetration (chained, larger magnitude wins, capped at a full bypass)
//! - Break chance for durability loss
//! - Slot-scoped attribute modifiers
//! - Triggered actions on hit
//!
//! Every query walks the active traits in registry order.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_PENETRATION, TRIGGERED_ACTION_PERMISSION};
use crate::effect::{EffectProfile, EquipSlot, SlotModifiers};
use crate::level::LevelTier;
use crate::store::{self, ActiveTrait, TraitHolder};
use crate::traits::TraitRegistry;

/// Host entity handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

/// Who a triggered action runs as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionContext {
    pub executor: EntityId,
    pub permission_level: u8,
}

/// Host command runner for triggered actions
pub trait ActionSink {
    fn execute(&mut self, command: &str, context: &ActionContext);
}

/// Collects commands instead of running them
impl ActionSink for Vec<(String, ActionContext)> {
    fn execute(&mut self, command: &str, context: &ActionContext) {
        self.push((command.to_string(), *context));
    }
}

/// Read-only view that resolves item state against a registry
#[derive(Debug, Clone, Copy)]
pub struct EffectResolver<'r> {
    registry: &'r TraitRegistry,
}

impl<'r> EffectResolver<'r> {
    pub fn new(registry: &'r TraitRegistry) -> Self {
        Self { registry }
    }

    pub fn level_of<H: TraitHolder + ?Sized>(&self, item: &H, trait_id: &str) -> LevelTier {
        store::level_of(item, trait_id)
    }

    pub fn profile_at(&self, trait_id: &str, level: LevelTier) -> Option<&'r EffectProfile> {
        self.registry.lookup(trait_id)?.profile_at(level)
    }

    pub fn active_traits<H: TraitHolder + ?Sized>(&self, item: &H) -> Vec<ActiveTrait> {
        store::all_traits_on(item, self.registry)
    }

    /// Applies `f` over the profile of every active trait, in registry order
    fn fold_profiles<H, T>(&self, item: &H, init: T, mut f: impl FnMut(T, &EffectProfile) -> T) -> T
    where
        H: TraitHolder + ?Sized,
    {
        self.active_traits(item)
            .iter()
            .filter_map(|active| active.trait_def.profile_at(active.level))
            .fold(init, |acc, profile| f(acc, profile))
    }

    pub fn knockback_multiplier<H: TraitHolder + ?Sized>(&self, item: &H) -> f64 {
        self.fold_profiles(item, 1.0, |cur, profile| profile.knockback_multiplier(cur))
    }

    /// Knockback strength after the held item's traits
    pub fn scale_knockback<H: TraitHolder + ?Sized>(&self, item: &H, strength: f64) -> f64 {
        strength * self.knockback_multiplier(item)
    }

    /// Fraction of damage that bypasses mitigation. Never above 1; may be negative.
    pub fn penetration<H: TraitHolder + ?Sized>(&self, item: &H) -> f64 {
        self.fold_profiles(item, 0.0, |cur, profile| profile.chain_penetration(cur))
            .min(MAX_PENETRATION)
    }

    /// Chance that a durability loss goes through; 0 for items without traits
    pub fn break_chance<H: TraitHolder + ?Sized>(&self, item: &H) -> f64 {
        let active = self.active_traits(item);
        if active.is_empty() {
            return 0.0;
        }
        active
            .iter()
            .filter_map(|a| a.trait_def.profile_at(a.level))
            .fold(1.0, |cur, profile| profile.chance_to_break(cur))
    }

    /// Union of the active traits' modifiers for `slot`
    pub fn attribute_modifiers<H: TraitHolder + ?Sized>(
        &self,
        item: &H,
        slot: EquipSlot,
    ) -> SlotModifiers {
        self.fold_profiles(item, SlotModifiers::new(), |mut acc, profile| {
            if let Some(mods) = profile.modifiers_for(slot) {
                for (key, list) in mods {
                    acc.entry(key.clone()).or_default().extend(list.iter().cloned());
                }
            }
            acc
        })
    }

    /// Runs every active trait's triggered action once.
    ///
    /// Does nothing unless `authoritative`; returns how many actions ran.
    pub fn on_hit<H: TraitHolder + ?Sized>(
        &self,
        item: &H,
        attacker: EntityId,
        sink: &mut dyn ActionSink,
        authoritative: bool,
    ) -> usize {
        if !authoritative {
            return 0;
        }
        let context = ActionContext {
            executor: attacker,
            permission_level: TRIGGERED_ACTION_PERMISSION,
        };
        self.fold_profiles(item, 0, |ran, profile| match profile.triggered_action.as_deref() {
            Some(command) if profile.has_triggered_action() => {
                sink.execute(command, &context);
                ran + 1
            }
            _ => ran,
        })
    }

    /// Strongest tier among the item's registered traits
    pub fn highest_level<H: TraitHolder + ?Sized>(&self, item: &H) -> LevelTier {
        self.active_traits(item)
            .iter()
            .map(|a| a.level)
            .max()
            .unwrap_or_default()
    }
}

/// Durability protection across the per-point rolls of one damage event.
///
/// The host rolls once per point of durability damage; the break chance is
/// resolved on index 0 and reused for the rest of the event. An item with no
/// active traits has no chance at all and is never protected.
#[derive(Debug, Clone, Default)]
pub struct DurabilityRoll {
    chance: Option<f64>,
}

impl DurabilityRoll {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when this point of durability damage should be ignored
    pub fn prevent_damage<H, R>(
        &mut self,
        resolver: &EffectResolver<'_>,
        item: &H,
        index: u32,
        rng: &mut R,
    ) -> bool
    where
        H: TraitHolder + ?Sized,
        R: Rng + ?Sized,
    {
        if index == 0 {
            self.chance = if resolver.active_traits(item).is_empty() {
                None
            } else {
                Some(resolver.break_chance(item))
            };
        }
        match self.chance {
            Some(chance) => rng.gen::<f64>() >= chance,
            None => false,
        }
    }

    /// Cached break chance, `None` when the item had no active traits
    pub fn chance(&self) -> Option<f64> {
        self.chance
    }
}
