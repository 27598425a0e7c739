//! Per-tier effect data carried by a trait.
//!
//! An [`EffectProfile`] is plain data: the resolver reads it, nothing dispatches
//! on it. Profiles are fully resolved at load time (tier inheritance already
//! applied), so queries never walk the tier scale.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Equipment slot an attribute modifier applies in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EquipSlot {
    MainHand,
    OffHand,
    Head,
    Body,
    Legs,
    Feet,
}

impl EquipSlot {
    pub const ALL: [EquipSlot; 6] = [
        Self::MainHand,
        Self::OffHand,
        Self::Head,
        Self::Body,
        Self::Legs,
        Self::Feet,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MainHand => "Main Hand",
            Self::OffHand => "Off Hand",
            Self::Head => "Head",
            Self::Body => "Body",
            Self::Legs => "Legs",
            Self::Feet => "Feet",
        }
    }
}

/// How a modifier combines with an attribute's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierOp {
    /// Added to the base amount
    #[serde(alias = "add")]
    FlatAdd,
    /// Summed with other percentages, then applied once
    #[serde(alias = "percent-additive")]
    PercentAdditive,
    /// Applied multiplicatively, one factor per modifier
    #[serde(alias = "percent-exponential")]
    PercentExponential,
}

/// A single attribute modifier. Mirrors the host's modifier record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeModifier {
    pub id: String,
    pub name: String,
    pub amount: f64,
    pub op: ModifierOp,
}

impl AttributeModifier {
    pub fn new(id: impl Into<String>, name: impl Into<String>, amount: f64, op: ModifierOp) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            amount,
            op,
        }
    }

    pub fn flat(id: impl Into<String>, amount: f64) -> Self {
        let id = id.into();
        Self::new(id.clone(), id, amount, ModifierOp::FlatAdd)
    }
}

/// Attribute key → modifiers, for one equipment slot
pub type SlotModifiers = BTreeMap<String, Vec<AttributeModifier>>;

/// Effects of one trait at one tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectProfile {
    /// Chance (0..1) that a durability loss is ignored
    pub break_resistance: f64,
    /// Fraction (-1..1) of damage routed around mitigation
    pub penetration: f64,
    /// Knockback strength multiplier
    pub knockback: f64,
    pub attributes: BTreeMap<EquipSlot, SlotModifiers>,
    /// Opaque command run on the server when the holder lands a hit
    pub triggered_action: Option<String>,
}

impl Default for EffectProfile {
    fn default() -> Self {
        Self {
            break_resistance: 0.0,
            penetration: 0.0,
            knockback: 1.0,
            attributes: BTreeMap::new(),
            triggered_action: None,
        }
    }
}

impl EffectProfile {
    /// Modifiers this profile grants in `slot`
    pub fn modifiers_for(&self, slot: EquipSlot) -> Option<&SlotModifiers> {
        self.attributes.get(&slot)
    }

    pub fn knockback_multiplier(&self, current: f64) -> f64 {
        self.knockback * current
    }

    /// Chains this profile's penetration onto the running value.
    ///
    /// An exact opposite of the running value keeps the negative of the pair
    /// instead of cancelling to zero. Otherwise the larger magnitude wins.
    pub fn chain_penetration(&self, current: f64) -> f64 {
        if current == -self.penetration {
            return if current < 0.0 { current } else { -current };
        }
        if self.penetration.abs() > current.abs() {
            return self.penetration;
        }
        current
    }

    pub fn chance_to_break(&self, current: f64) -> f64 {
        (1.0 - self.break_resistance) * current
    }

    pub fn has_triggered_action(&self) -> bool {
        self.triggered_action
            .as_deref()
            .is_some_and(|action| !action.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_penetration(penetration: f64) -> EffectProfile {
        EffectProfile {
            penetration,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_profile_is_neutral() {
        let profile = EffectProfile::default();
        assert_eq!(profile.knockback_multiplier(2.0), 2.0);
        assert_eq!(profile.chain_penetration(0.4), 0.4);
        assert_eq!(profile.chance_to_break(0.5), 0.5);
        assert!(!profile.has_triggered_action());
    }

    #[test]
    fn test_penetration_larger_magnitude_wins() {
        assert_eq!(with_penetration(0.3).chain_penetration(0.0), 0.3);
        assert_eq!(with_penetration(0.6).chain_penetration(0.3), 0.6);
        assert_eq!(with_penetration(0.2).chain_penetration(0.6), 0.6);
        assert_eq!(with_penetration(-0.8).chain_penetration(0.6), -0.8);
    }

    #[test]
    fn test_penetration_exact_opposite_inverts() {
        assert_eq!(with_penetration(-0.6).chain_penetration(0.6), -0.6);
        // Already negative: stays negative
        assert_eq!(with_penetration(0.6).chain_penetration(-0.6), -0.6);
    }

    #[test]
    fn test_blank_triggered_action_ignored() {
        let profile = EffectProfile {
            triggered_action: Some("   ".into()),
            ..Default::default()
        };
        assert!(!profile.has_triggered_action());
    }

    #[test]
    fn test_modifier_op_accepts_add_alias() {
        let op: ModifierOp = serde_json::from_str("\"add\"").unwrap();
        assert_eq!(op, ModifierOp::FlatAdd);
        let op: ModifierOp = serde_json::from_str("\"percent_exponential\"").unwrap();
        assert_eq!(op, ModifierOp::PercentExponential);
    }
}
