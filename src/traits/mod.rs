//! Trait registry.
//!
//! Traits are named capabilities with a conflict set and one resolved
//! [`EffectProfile`] per grantable tier. The registry keeps registration order,
//! which is also the order effects are chained in.

pub mod definition;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::constants::DEFAULT_TRAIT_WEIGHT;
use crate::effect::EffectProfile;
use crate::level::LevelTier;

pub use definition::{
    parse_json_records, parse_ron_pack, DefinitionError, ModifierSpec, TierOverrides,
    TraitDefinition, TraitLoadReport,
};

/// A registered trait
#[derive(Debug, Clone, PartialEq)]
pub struct Trait {
    id: String,
    display_text: String,
    conflicts: BTreeSet<String>,
    weight: u32,
    levels: BTreeMap<LevelTier, EffectProfile>,
}

impl Trait {
    pub fn new(
        id: impl Into<String>,
        display_text: impl Into<String>,
        conflicts: impl IntoIterator<Item = String>,
        levels: BTreeMap<LevelTier, EffectProfile>,
    ) -> Self {
        let mut levels = levels;
        levels.remove(&LevelTier::None);
        Self {
            id: id.into(),
            display_text: display_text.into(),
            conflicts: conflicts.into_iter().collect(),
            weight: DEFAULT_TRAIT_WEIGHT,
            levels,
        }
    }

    /// Trait with the same profile at every tier
    pub fn uniform(id: impl Into<String>, profile: EffectProfile) -> Self {
        let id = id.into();
        let levels = LevelTier::LEVELS
            .iter()
            .map(|level| (*level, profile.clone()))
            .collect();
        Self::new(id.clone(), id, Vec::new(), levels)
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_conflicts(mut self, conflicts: impl IntoIterator<Item = String>) -> Self {
        self.conflicts = conflicts.into_iter().collect();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_text(&self) -> &str {
        &self.display_text
    }

    pub fn conflicts(&self) -> &BTreeSet<String> {
        &self.conflicts
    }

    /// Relative selection weight; 100 is neutral
    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Profile at `level`. `None` never has one.
    pub fn profile_at(&self, level: LevelTier) -> Option<&EffectProfile> {
        if level.is_none() {
            return None;
        }
        self.levels.get(&level)
    }

    /// True when the two traits may sit on the same item.
    /// Conflicts are honoured in both directions.
    pub fn can_be_applied_with(&self, other: &Trait) -> bool {
        self.id != other.id
            && !self.conflicts.contains(&other.id)
            && !other.conflicts.contains(&self.id)
    }
}

/// Registry of every currently loaded trait
#[derive(Debug, Default, Clone)]
pub struct TraitRegistry {
    traits: Vec<Arc<Trait>>,
    index: HashMap<String, usize>,
}

impl TraitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a trait. An id that is already present is replaced in place,
    /// keeping its original position; the replaced trait is returned.
    pub fn register(&mut self, trait_def: Trait) -> Option<Arc<Trait>> {
        let trait_def = Arc::new(trait_def);
        match self.index.get(trait_def.id()) {
            Some(&slot) => {
                debug!(trait_id = trait_def.id(), "replacing registered trait");
                Some(std::mem::replace(&mut self.traits[slot], trait_def))
            }
            None => {
                self.index
                    .insert(trait_def.id().to_string(), self.traits.len());
                self.traits.push(trait_def);
                None
            }
        }
    }

    pub fn purge_all(&mut self) {
        self.traits.clear();
        self.index.clear();
    }

    pub fn lookup(&self, id: &str) -> Option<&Arc<Trait>> {
        self.index.get(id).map(|&slot| &self.traits[slot])
    }

    /// Traits in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Trait>> {
        self.traits.iter()
    }

    pub fn len(&self) -> usize {
        self.traits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traits.is_empty()
    }

    /// Position of `id` in registration order
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Whether two registered traits may be combined. Unknown ids never combine.
    pub fn can_combine(&self, a: &str, b: &str) -> bool {
        match (self.lookup(a), self.lookup(b)) {
            (Some(a), Some(b)) => a.can_be_applied_with(b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(id: &str, conflicts: &[&str]) -> Trait {
        Trait::uniform(id, EffectProfile::default())
            .with_conflicts(conflicts.iter().map(|c| c.to_string()))
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = TraitRegistry::new();
        assert!(registry.register(named("keen", &[])).is_none());
        assert!(registry.lookup("keen").is_some());
        assert!(registry.lookup("dull").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reregister_keeps_position() {
        let mut registry = TraitRegistry::new();
        registry.register(named("keen", &[]));
        registry.register(named("sturdy", &[]));
        let replaced = registry.register(named("keen", &["sturdy"]).with_weight(7));
        assert!(replaced.is_some());
        assert_eq!(registry.position("keen"), Some(0));
        assert_eq!(registry.lookup("keen").unwrap().weight(), 7);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_purge_all() {
        let mut registry = TraitRegistry::new();
        registry.register(named("keen", &[]));
        registry.purge_all();
        assert!(registry.is_empty());
        assert!(registry.lookup("keen").is_none());
    }

    #[test]
    fn test_can_combine_rejects_self() {
        let mut registry = TraitRegistry::new();
        registry.register(named("keen", &[]));
        assert!(!registry.can_combine("keen", "keen"));
    }

    #[test]
    fn test_can_combine_is_symmetric_for_one_sided_conflict() {
        let mut registry = TraitRegistry::new();
        registry.register(named("keen", &["dull"]));
        registry.register(named("dull", &[]));
        registry.register(named("sturdy", &[]));
        assert!(!registry.can_combine("keen", "dull"));
        assert!(!registry.can_combine("dull", "keen"));
        assert!(registry.can_combine("keen", "sturdy"));
        assert!(registry.can_combine("sturdy", "keen"));
    }

    #[test]
    fn test_unknown_never_combines() {
        let mut registry = TraitRegistry::new();
        registry.register(named("keen", &[]));
        assert!(!registry.can_combine("keen", "ghost"));
    }

    #[test]
    fn test_none_tier_has_no_profile() {
        let t = named("keen", &[]);
        assert!(t.profile_at(LevelTier::None).is_none());
        assert!(t.profile_at(LevelTier::Epic).is_some());
    }
}
