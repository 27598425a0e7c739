//! Penetration Coordinator
//!
//! Penetration splits one attack in two: a bypass hit that ignores mitigation
//! for `amount * fraction`, and the original hit reduced to the remaining
//! share once the host finalizes its damage. The two halves happen in
//! different host events, so attack-start hands back a [`PenetrationHandoff`]
//! that the caller keeps (in a [`PenetrationState`]) until damage-finalize.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::resolver::{ActionSink, EffectResolver, EntityId};
use crate::store::TraitHolder;

/// Identity of one damage source instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId {
    pub raw: u64,
    /// Set on the bypass wrapper so it never matches the source it wraps
    pub penetrating: bool,
}

impl SourceId {
    pub fn new(raw: u64) -> Self {
        Self {
            raw,
            penetrating: false,
        }
    }

    pub fn as_penetrating(self) -> Self {
        Self {
            penetrating: true,
            ..self
        }
    }
}

/// Host damage source
pub trait DamageSource {
    fn id(&self) -> SourceId;
    fn damage_type(&self) -> &str;
    fn is_unblockable(&self) -> bool;
    fn hunger_damage(&self) -> f64;

    fn is_projectile(&self) -> bool {
        false
    }

    fn is_explosion(&self) -> bool {
        false
    }

    fn is_damage_absolute(&self) -> bool {
        false
    }

    fn immediate_source(&self) -> Option<EntityId> {
        self.true_source()
    }

    /// Entity ultimately responsible for the damage
    fn true_source(&self) -> Option<EntityId>;

    fn true_source_is_living(&self) -> bool {
        self.true_source().is_some()
    }

    fn death_message(&self, victim: EntityId) -> String;
}

/// Wraps a source so its damage skips mitigation and costs no hunger
pub struct PenetratingSource<'s> {
    parent: &'s dyn DamageSource,
}

impl<'s> PenetratingSource<'s> {
    pub fn new(parent: &'s dyn DamageSource) -> Self {
        Self { parent }
    }
}

impl DamageSource for PenetratingSource<'_> {
    fn id(&self) -> SourceId {
        self.parent.id().as_penetrating()
    }

    fn damage_type(&self) -> &str {
        self.parent.damage_type()
    }

    fn is_unblockable(&self) -> bool {
        true
    }

    fn hunger_damage(&self) -> f64 {
        0.0
    }

    fn is_projectile(&self) -> bool {
        self.parent.is_projectile()
    }

    fn is_explosion(&self) -> bool {
        self.parent.is_explosion()
    }

    fn is_damage_absolute(&self) -> bool {
        self.parent.is_damage_absolute()
    }

    fn immediate_source(&self) -> Option<EntityId> {
        self.parent.immediate_source()
    }

    fn true_source(&self) -> Option<EntityId> {
        self.parent.true_source()
    }

    fn true_source_is_living(&self) -> bool {
        self.parent.true_source_is_living()
    }

    fn death_message(&self, victim: EntityId) -> String {
        self.parent.death_message(victim)
    }
}

/// Host entity that can be damaged
pub trait Combatant {
    fn entity_id(&self) -> EntityId;

    /// Remaining hit-invulnerability ticks
    fn hurt_resistant_time(&self) -> u32;

    fn set_hurt_resistant_time(&mut self, ticks: u32);

    /// Damages the entity through the host's normal damage path
    fn attack_entity_from(&mut self, source: &dyn DamageSource, amount: f64) -> bool;
}

/// Armed penetration data carried from attack-start to damage-finalize
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PenetrationHandoff {
    pub target: EntityId,
    pub source: SourceId,
    pub fraction: f64,
}

impl PenetrationHandoff {
    pub fn matches(&self, target: EntityId, source: SourceId) -> bool {
        self.target == target && self.source == source
    }
}

/// Handoff slot for one attack
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum PenetrationState {
    #[default]
    Idle,
    Armed(PenetrationHandoff),
}

impl PenetrationState {
    pub fn arm(&mut self, handoff: PenetrationHandoff) {
        *self = Self::Armed(handoff);
    }

    pub fn is_armed(&self) -> bool {
        matches!(self, Self::Armed(_))
    }

    /// Reduces the original hit to its non-bypassed share.
    ///
    /// Only a matching (target, source) consumes the handoff; anything else
    /// passes through untouched and leaves the state armed.
    pub fn finalize(&mut self, target: EntityId, source: SourceId, amount: f64) -> f64 {
        match *self {
            Self::Armed(handoff) if handoff.matches(target, source) => {
                *self = Self::Idle;
                debug!(target = target.0, fraction = handoff.fraction, "penetration consumed");
                amount * (1.0 - handoff.fraction)
            }
            _ => amount,
        }
    }
}

/// What attack-start did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttackResolution {
    pub handoff: Option<PenetrationHandoff>,
    /// The host should drop the original attack
    pub cancel_original: bool,
    /// Damage dealt by the bypass hit, if one was issued
    pub bypass_damage: Option<f64>,
    pub actions_run: usize,
}

/// Attack-start side of penetration
#[derive(Debug, Clone, Copy)]
pub struct PenetrationCoordinator<'r> {
    resolver: EffectResolver<'r>,
}

impl<'r> PenetrationCoordinator<'r> {
    pub fn new(resolver: EffectResolver<'r>) -> Self {
        Self { resolver }
    }

    /// Handles attack-start for `target` being hit by `source` for `amount`.
    ///
    /// `held_item` is the attacker's main-hand item. Triggered actions run only
    /// when `authoritative`.
    pub fn on_attack_start<T, H>(
        &self,
        target: &mut T,
        source: &dyn DamageSource,
        amount: f64,
        held_item: Option<&H>,
        authoritative: bool,
        sink: &mut dyn ActionSink,
    ) -> AttackResolution
    where
        T: Combatant + ?Sized,
        H: TraitHolder + ?Sized,
    {
        let mut resolution = AttackResolution::default();
        if source.is_unblockable() || !source.true_source_is_living() {
            return resolution;
        }
        let (Some(attacker), Some(item)) = (source.true_source(), held_item) else {
            return resolution;
        };
        if self.resolver.active_traits(item).is_empty() {
            return resolution;
        }

        let fraction = self.resolver.penetration(item);
        if fraction > 0.0 {
            let bypass = PenetratingSource::new(source);
            let bypass_amount = amount * fraction;
            let resistance = target.hurt_resistant_time();
            target.attack_entity_from(&bypass, bypass_amount);

            if fraction >= 1.0 {
                resolution.cancel_original = true;
            } else {
                target.set_hurt_resistant_time(resistance);
            }

            let handoff = PenetrationHandoff {
                target: target.entity_id(),
                source: source.id(),
                fraction,
            };
            debug!(
                target = handoff.target.0,
                fraction,
                bypass_amount,
                "penetration armed"
            );
            resolution.handoff = Some(handoff);
            resolution.bypass_damage = Some(bypass_amount);
        }

        resolution.actions_run = self.resolver.on_hit(item, attacker, sink, authoritative);
        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::EffectProfile;
    use crate::level::LevelTier;
    use crate::resolver::ActionContext;
    use crate::store::{self, ItemStack};
    use crate::traits::{Trait, TraitRegistry};

    struct Source {
        id: SourceId,
        attacker: Option<EntityId>,
        unblockable: bool,
    }

    impl DamageSource for Source {
        fn id(&self) -> SourceId {
            self.id
        }
        fn damage_type(&self) -> &str {
            "player"
        }
        fn is_unblockable(&self) -> bool {
            self.unblockable
        }
        fn hunger_damage(&self) -> f64 {
            0.1
        }
        fn is_projectile(&self) -> bool {
            true
        }
        fn is_explosion(&self) -> bool {
            true
        }
        fn is_damage_absolute(&self) -> bool {
            true
        }
        fn immediate_source(&self) -> Option<EntityId> {
            Some(EntityId(3))
        }
        fn true_source(&self) -> Option<EntityId> {
            self.attacker
        }
        fn death_message(&self, victim: EntityId) -> String {
            format!("{} was slain", victim.0)
        }
    }

    fn melee(raw: u64) -> Source {
        Source {
            id: SourceId::new(raw),
            attacker: Some(EntityId(1)),
            unblockable: false,
        }
    }

    #[derive(Default)]
    struct Dummy {
        hurt_resistant_time: u32,
        hits: Vec<(SourceId, bool, f64)>,
    }

    impl Combatant for Dummy {
        fn entity_id(&self) -> EntityId {
            EntityId(2)
        }
        fn hurt_resistant_time(&self) -> u32 {
            self.hurt_resistant_time
        }
        fn set_hurt_resistant_time(&mut self, ticks: u32) {
            self.hurt_resistant_time = ticks;
        }
        fn attack_entity_from(&mut self, source: &dyn DamageSource, amount: f64) -> bool {
            self.hits.push((source.id(), source.is_unblockable(), amount));
            // Host resets invulnerability on every hit
            self.hurt_resistant_time = 20;
            true
        }
    }

    fn registry_with(penetration: f64) -> TraitRegistry {
        let mut registry = TraitRegistry::new();
        registry.register(Trait::uniform(
            "keen",
            EffectProfile {
                penetration,
                triggered_action: Some("say hit".into()),
                ..Default::default()
            },
        ));
        registry
    }

    fn keen_sword() -> ItemStack {
        let mut item = ItemStack::new("iron_sword");
        store::set(&mut item, "keen", LevelTier::Rare);
        item
    }

    #[test]
    fn test_partial_penetration_arms_and_restores_invulnerability() {
        let registry = registry_with(0.25);
        let coordinator = PenetrationCoordinator::new(EffectResolver::new(&registry));
        let mut target = Dummy {
            hurt_resistant_time: 3,
            ..Default::default()
        };
        let mut sink: Vec<(String, ActionContext)> = Vec::new();
        let item = keen_sword();

        let resolution =
            coordinator.on_attack_start(&mut target, &melee(7), 8.0, Some(&item), true, &mut sink);

        assert_eq!(resolution.bypass_damage, Some(2.0));
        assert!(!resolution.cancel_original);
        assert_eq!(target.hurt_resistant_time, 3);
        assert_eq!(target.hits, vec![(SourceId::new(7).as_penetrating(), true, 2.0)]);
        assert_eq!(resolution.actions_run, 1);

        let mut state = PenetrationState::default();
        state.arm(resolution.handoff.unwrap());

        // The bypass hit itself is not reduced
        assert_eq!(state.finalize(EntityId(2), SourceId::new(7).as_penetrating(), 2.0), 2.0);
        assert!(state.is_armed());

        assert_eq!(state.finalize(EntityId(2), SourceId::new(7), 8.0), 6.0);
        assert_eq!(state, PenetrationState::Idle);
    }

    #[test]
    fn test_full_penetration_cancels_original() {
        let registry = registry_with(1.0);
        let coordinator = PenetrationCoordinator::new(EffectResolver::new(&registry));
        let mut target = Dummy {
            hurt_resistant_time: 3,
            ..Default::default()
        };
        let mut sink: Vec<(String, ActionContext)> = Vec::new();
        let item = keen_sword();

        let resolution =
            coordinator.on_attack_start(&mut target, &melee(7), 8.0, Some(&item), false, &mut sink);
        assert!(resolution.cancel_original);
        assert_eq!(resolution.bypass_damage, Some(8.0));
        // Restore skipped: the bypass hit stands alone
        assert_eq!(target.hurt_resistant_time, 20);
        assert!(resolution.handoff.is_some());
        assert_eq!(resolution.actions_run, 0);
    }

    #[test]
    fn test_negative_or_zero_penetration_does_nothing() {
        for penetration in [0.0, -0.5] {
            let registry = registry_with(penetration);
            let coordinator = PenetrationCoordinator::new(EffectResolver::new(&registry));
            let mut target = Dummy::default();
            let mut sink: Vec<(String, ActionContext)> = Vec::new();
            let item = keen_sword();
            let resolution =
                coordinator.on_attack_start(&mut target, &melee(7), 8.0, Some(&item), true, &mut sink);
            assert!(resolution.handoff.is_none());
            assert!(target.hits.is_empty());
            // On-hit still runs
            assert_eq!(resolution.actions_run, 1);
        }
    }

    #[test]
    fn test_skips_unblockable_and_sourceless() {
        let registry = registry_with(0.5);
        let coordinator = PenetrationCoordinator::new(EffectResolver::new(&registry));
        let item = keen_sword();
        let mut sink: Vec<(String, ActionContext)> = Vec::new();

        for source in [
            Source { unblockable: true, ..melee(1) },
            Source { attacker: None, ..melee(2) },
        ] {
            let mut target = Dummy::default();
            let resolution =
                coordinator.on_attack_start(&mut target, &source, 8.0, Some(&item), true, &mut sink);
            assert_eq!(resolution, AttackResolution::default());
            assert!(target.hits.is_empty());
        }
        assert!(sink.is_empty());
    }

    #[test]
    fn test_no_held_item_or_no_traits() {
        let registry = registry_with(0.5);
        let coordinator = PenetrationCoordinator::new(EffectResolver::new(&registry));
        let mut sink: Vec<(String, ActionContext)> = Vec::new();
        let mut target = Dummy::default();

        let resolution = coordinator.on_attack_start::<_, ItemStack>(
            &mut target,
            &melee(1),
            8.0,
            None,
            true,
            &mut sink,
        );
        assert_eq!(resolution, AttackResolution::default());

        let bare = ItemStack::new("iron_sword");
        let resolution =
            coordinator.on_attack_start(&mut target, &melee(1), 8.0, Some(&bare), true, &mut sink);
        assert_eq!(resolution, AttackResolution::default());
    }

    #[test]
    fn test_independent_handoffs_do_not_interfere() {
        let first = PenetrationHandoff {
            target: EntityId(2),
            source: SourceId::new(1),
            fraction: 0.5,
        };
        let second = PenetrationHandoff {
            target: EntityId(3),
            source: SourceId::new(2),
            fraction: 0.25,
        };
        let mut a = PenetrationState::default();
        let mut b = PenetrationState::default();
        a.arm(first);
        b.arm(second);

        assert_eq!(b.finalize(EntityId(3), SourceId::new(2), 4.0), 3.0);
        assert!(a.is_armed());
        assert_eq!(a.finalize(EntityId(2), SourceId::new(1), 4.0), 2.0);
    }

    #[test]
    fn test_wrapper_delegates() {
        let source = melee(4);
        let wrapper = PenetratingSource::new(&source);
        assert!(wrapper.is_unblockable());
        assert_eq!(wrapper.hunger_damage(), 0.0);
        assert!(wrapper.is_projectile());
        assert!(wrapper.is_explosion());
        assert!(wrapper.is_damage_absolute());
        assert_eq!(wrapper.immediate_source(), Some(EntityId(3)));
        assert_eq!(wrapper.damage_type(), "player");
        assert_eq!(wrapper.true_source(), Some(EntityId(1)));
        assert_eq!(wrapper.death_message(EntityId(2)), "2 was slain");
        assert_ne!(wrapper.id(), source.id());
    }
}
