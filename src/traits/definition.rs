//! Trait definition records and their conversion into registered traits.
//!
//! A definition lists sparse per-tier overrides. Each field a tier leaves out
//! inherits the nearest value set on a lower tier, down to uncommon, and falls
//! back to the neutral default when no tier sets it. Inheritance is resolved
//! here, once, so registered traits carry complete profiles.
//!
//! Example (RON):
//! ```ron
//! [
//!     (
//!         id: "keen",
//!         display_text: "Keen",
//!         conflicts: ["dull"],
//!         tiers: {
//!             "uncommon": (penetration: 0.1),
//!             "epic": (
//!                 penetration: 0.25,
//!                 attributes: { "MainHand": { "attack_damage": [(kind: "flat_add", value: 1.0)] } },
//!             ),
//!         },
//!     ),
//! ]
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::DEFAULT_TRAIT_WEIGHT;
use crate::effect::{AttributeModifier, EffectProfile, EquipSlot, ModifierOp, SlotModifiers};
use crate::level::LevelTier;
use crate::traits::Trait;

/// One modifier entry inside a definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierSpec {
    pub kind: ModifierOp,
    pub value: f64,
}

/// Overrides one tier applies on top of the tiers below it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierOverrides {
    pub break_resistance: Option<f64>,
    pub penetration: Option<f64>,
    pub knockback: Option<f64>,
    pub attributes: BTreeMap<EquipSlot, BTreeMap<String, Vec<ModifierSpec>>>,
    pub triggered_action: Option<String>,
}

fn default_weight() -> u32 {
    DEFAULT_TRAIT_WEIGHT
}

/// A trait as authored in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitDefinition {
    pub id: String,
    pub display_text: String,
    #[serde(default)]
    pub conflicts: Vec<String>,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub tiers: BTreeMap<LevelTier, TierOverrides>,
}

/// Why a single definition record was rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DefinitionError {
    #[error("record is not a valid trait definition: {0}")]
    Malformed(String),
    #[error("trait id is empty")]
    EmptyId,
    #[error("trait '{id}' declares overrides for the none tier")]
    NoneTier { id: String },
    #[error("trait '{id}' {field} at {level} is {value}, expected {range}")]
    OutOfRange {
        id: String,
        field: &'static str,
        level: LevelTier,
        value: f64,
        range: &'static str,
    },
}

/// Result of loading a batch of definition records
#[derive(Debug, Default)]
pub struct TraitLoadReport {
    pub traits: Vec<Trait>,
    /// (record index, reason) for every skipped record
    pub skipped: Vec<(usize, DefinitionError)>,
}

impl TraitLoadReport {
    fn push(&mut self, index: usize, result: Result<Trait, DefinitionError>) {
        match result {
            Ok(loaded) => self.traits.push(loaded),
            Err(e) => {
                warn!(record = index, error = %e, "skipping trait definition");
                self.skipped.push((index, e));
            }
        }
    }
}

impl TraitDefinition {
    /// Resolves the sparse overrides into a registered trait
    pub fn build(&self) -> Result<Trait, DefinitionError> {
        self.validate()?;

        let attribute_keys: BTreeSet<(EquipSlot, &str)> = self
            .tiers
            .values()
            .flat_map(|tier| {
                tier.attributes
                    .iter()
                    .flat_map(|(slot, keys)| keys.keys().map(move |key| (*slot, key.as_str())))
            })
            .collect();

        let mut modifier_id = 0usize;
        let mut levels = BTreeMap::new();

        for level in LevelTier::LEVELS {
            let mut profile = EffectProfile::default();

            if let Some(v) = self.resolve_upwards(level, |t| t.break_resistance) {
                profile.break_resistance = v;
            }
            if let Some(v) = self.resolve_upwards(level, |t| t.penetration) {
                profile.penetration = v;
            }
            if let Some(v) = self.resolve_upwards(level, |t| t.knockback) {
                profile.knockback = v;
            }
            profile.triggered_action = self
                .resolve_upwards(level, |t| t.triggered_action.clone())
                .filter(|action| !action.trim().is_empty());

            for (slot, key) in &attribute_keys {
                let Some(specs) = self.resolve_upwards(level, |t| {
                    t.attributes.get(slot).and_then(|keys| keys.get(*key)).cloned()
                }) else {
                    continue;
                };
                if specs.is_empty() {
                    continue;
                }
                let slot_mods: &mut SlotModifiers = profile.attributes.entry(*slot).or_default();
                let entry = slot_mods.entry(key.to_string()).or_default();
                for spec in specs {
                    entry.push(AttributeModifier::new(
                        format!("{}#{}", self.id, modifier_id),
                        format!("{} {}", self.display_text, level),
                        spec.value,
                        spec.kind,
                    ));
                    modifier_id += 1;
                }
            }

            levels.insert(level, profile);
        }

        Ok(Trait::new(
            self.id.clone(),
            self.display_text.clone(),
            self.conflicts.iter().cloned(),
            levels,
        )
        .with_weight(self.weight))
    }

    /// Nearest value set at `level` or below (never consulting `None`)
    fn resolve_upwards<T>(
        &self,
        level: LevelTier,
        field: impl Fn(&TierOverrides) -> Option<T>,
    ) -> Option<T> {
        (1..=level.ordinal())
            .rev()
            .map(LevelTier::from_ordinal)
            .find_map(|tier| self.tiers.get(&tier).and_then(&field))
    }

    fn validate(&self) -> Result<(), DefinitionError> {
        if self.id.trim().is_empty() {
            return Err(DefinitionError::EmptyId);
        }
        if self.tiers.contains_key(&LevelTier::None) {
            return Err(DefinitionError::NoneTier {
                id: self.id.clone(),
            });
        }
        for (level, tier) in &self.tiers {
            let out_of_range = |field, value: f64, range| DefinitionError::OutOfRange {
                id: self.id.clone(),
                field,
                level: *level,
                value,
                range,
            };
            if let Some(v) = tier.break_resistance {
                if !(0.0..=1.0).contains(&v) {
                    return Err(out_of_range("break_resistance", v, "0..=1"));
                }
            }
            if let Some(v) = tier.penetration {
                if !(-1.0..=1.0).contains(&v) {
                    return Err(out_of_range("penetration", v, "-1..=1"));
                }
            }
            if let Some(v) = tier.knockback {
                if !v.is_finite() || v < 0.0 {
                    return Err(out_of_range("knockback", v, "finite, >= 0"));
                }
            }
            for keys in tier.attributes.values() {
                for spec in keys.values().flatten() {
                    if !spec.value.is_finite() {
                        return Err(out_of_range("modifier value", spec.value, "finite"));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Builds traits from raw JSON records, skipping bad records individually
pub fn parse_json_records(records: &[serde_json::Value]) -> TraitLoadReport {
    let mut report = TraitLoadReport::default();
    for (index, record) in records.iter().enumerate() {
        let result = serde_json::from_value::<TraitDefinition>(record.clone())
            .map_err(|e| DefinitionError::Malformed(e.to_string()))
            .and_then(|def| def.build());
        report.push(index, result);
    }
    report
}

/// Builds traits from a RON pack (a list of records).
///
/// A pack that is not a list at all is an error; bad records inside it are
/// skipped. Tier names and modifier kinds are written as strings.
pub fn parse_ron_pack(content: &str) -> Result<TraitLoadReport, ron::error::SpannedError> {
    let values: Vec<ron::Value> = ron::from_str(content)?;
    // A record that has no JSON shape becomes null and is skipped as malformed
    let records: Vec<serde_json::Value> = values
        .iter()
        .map(|value| serde_json::to_value(value).unwrap_or(serde_json::Value::Null))
        .collect();
    Ok(parse_json_records(&records))
}
