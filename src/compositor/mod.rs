//! Modifier Compositor
//!
//! Folds trait-derived attribute modifiers into a host-owned modifier
//! collection. A key whose base holds exactly one flat modifier is collapsed
//! into a single flat value; any other base shape gets the trait modifiers
//! appended untouched.

use std::collections::{BTreeMap, HashMap};

use crate::effect::{AttributeModifier, ModifierOp, SlotModifiers};

/// Host-owned keyed multi-collection of attribute modifiers
pub trait ModifierMultimap {
    fn modifiers(&self, key: &str) -> &[AttributeModifier];

    /// Replaces everything stored under `key`
    fn replace_all(&mut self, key: &str, modifiers: Vec<AttributeModifier>);

    fn append(&mut self, key: &str, modifiers: &[AttributeModifier]);
}

impl ModifierMultimap for BTreeMap<String, Vec<AttributeModifier>> {
    fn modifiers(&self, key: &str) -> &[AttributeModifier] {
        self.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    fn replace_all(&mut self, key: &str, modifiers: Vec<AttributeModifier>) {
        self.insert(key.to_string(), modifiers);
    }

    fn append(&mut self, key: &str, modifiers: &[AttributeModifier]) {
        self.entry(key.to_string())
            .or_default()
            .extend_from_slice(modifiers);
    }
}

impl ModifierMultimap for HashMap<String, Vec<AttributeModifier>> {
    fn modifiers(&self, key: &str) -> &[AttributeModifier] {
        self.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    fn replace_all(&mut self, key: &str, modifiers: Vec<AttributeModifier>) {
        self.insert(key.to_string(), modifiers);
    }

    fn append(&mut self, key: &str, modifiers: &[AttributeModifier]) {
        self.entry(key.to_string())
            .or_default()
            .extend_from_slice(modifiers);
    }
}

/// Collapses `base` and `extra` into one flat amount:
/// (base + flats) * (1 + Σ additive percents) * Π (1 + exponential percent)
fn folded_amount(base: f64, extra: &[AttributeModifier]) -> f64 {
    let flat: f64 = extra
        .iter()
        .filter(|m| m.op == ModifierOp::FlatAdd)
        .map(|m| m.amount)
        .sum();
    let additive: f64 = extra
        .iter()
        .filter(|m| m.op == ModifierOp::PercentAdditive)
        .map(|m| m.amount)
        .sum();

    extra
        .iter()
        .filter(|m| m.op == ModifierOp::PercentExponential)
        .fold((base + flat) * (1.0 + additive), |amount, m| {
            amount * (1.0 + m.amount)
        })
}

/// Merges the trait modifiers for one slot into `base`
pub fn fold<M: ModifierMultimap + ?Sized>(base: &mut M, engine: &SlotModifiers) {
    for (key, extra) in engine {
        if extra.is_empty() {
            continue;
        }
        match base.modifiers(key) {
            [single] if single.op == ModifierOp::FlatAdd => {
                let merged = AttributeModifier::new(
                    single.id.clone(),
                    single.name.clone(),
                    folded_amount(single.amount, extra),
                    ModifierOp::FlatAdd,
                );
                base.replace_all(key, vec![merged]);
            }
            _ => base.append(key, extra),
        }
    }
}
