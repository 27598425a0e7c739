//! Persisted trait state on items.
//!
//! Traits live in a keyed region of the item's state (`relic:traits`), trait
//! id → tier identifier. A missing key is `None`, and the region is removed
//! as soon as it would be empty. Damaged regions read as "no traits".

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::constants::{ROLLED_MARKER_KEY, TRAIT_REGION_KEY};
use crate::level::LevelTier;
use crate::traits::{Trait, TraitRegistry};

/// Trait id → tier for one item
pub type ItemTraitState = BTreeMap<String, LevelTier>;

/// Host item whose state can carry traits
pub trait TraitHolder {
    /// Registry name of the item kind, used by whitelists
    fn item_id(&self) -> &str;

    fn region(&self, key: &str) -> Option<&Value>;

    fn set_region(&mut self, key: &str, value: Value);

    fn remove_region(&mut self, key: &str);

    /// Host hint for whether this kind of item takes traits when no whitelist is set
    fn default_eligible(&self) -> bool {
        true
    }
}

/// Plain item record for hosts without their own item state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item_id: String,
    #[serde(default)]
    pub tags: Map<String, Value>,
    #[serde(default = "default_true")]
    pub enchantable: bool,
}

fn default_true() -> bool {
    true
}

impl ItemStack {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            tags: Map::new(),
            enchantable: true,
        }
    }

    pub fn with_default_eligible(mut self, enchantable: bool) -> Self {
        self.enchantable = enchantable;
        self
    }
}

impl TraitHolder for ItemStack {
    fn item_id(&self) -> &str {
        &self.item_id
    }

    fn region(&self, key: &str) -> Option<&Value> {
        self.tags.get(key)
    }

    fn set_region(&mut self, key: &str, value: Value) {
        self.tags.insert(key.to_string(), value);
    }

    fn remove_region(&mut self, key: &str) {
        self.tags.remove(key);
    }

    fn default_eligible(&self) -> bool {
        self.enchantable
    }
}

/// An active trait on an item together with its tier
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveTrait {
    pub trait_def: Arc<Trait>,
    pub level: LevelTier,
}

/// Every readable trait entry on the item
pub fn get<H: TraitHolder + ?Sized>(item: &H) -> ItemTraitState {
    let Some(region) = item.region(TRAIT_REGION_KEY) else {
        return ItemTraitState::new();
    };
    let Some(entries) = region.as_object() else {
        warn!(item = item.item_id(), "trait region is not a map, ignoring it");
        return ItemTraitState::new();
    };

    entries
        .iter()
        .filter_map(|(id, value)| {
            let level = value.as_str().map(LevelTier::from_name).unwrap_or_default();
            if level.is_none() {
                warn!(item = item.item_id(), trait_id = %id, "skipping unreadable trait entry");
                return None;
            }
            Some((id.clone(), level))
        })
        .collect()
}

pub fn level_of<H: TraitHolder + ?Sized>(item: &H, trait_id: &str) -> LevelTier {
    item.region(TRAIT_REGION_KEY)
        .and_then(|region| region.get(trait_id))
        .and_then(Value::as_str)
        .map(LevelTier::from_name)
        .unwrap_or_default()
}

/// Sets one trait's tier; `None` removes it and prunes an emptied region
pub fn set<H: TraitHolder + ?Sized>(item: &mut H, trait_id: &str, level: LevelTier) {
    let mut entries = item
        .region(TRAIT_REGION_KEY)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    if level.is_none() {
        entries.remove(trait_id);
    } else {
        entries.insert(trait_id.to_string(), Value::String(level.name().to_string()));
    }

    if entries.is_empty() {
        item.remove_region(TRAIT_REGION_KEY);
    } else {
        item.set_region(TRAIT_REGION_KEY, Value::Object(entries));
    }
}

/// Removes every trait from the item
pub fn clear<H: TraitHolder + ?Sized>(item: &mut H) {
    item.remove_region(TRAIT_REGION_KEY);
}

pub fn has_trait_data<H: TraitHolder + ?Sized>(item: &H) -> bool {
    item.region(TRAIT_REGION_KEY).is_some()
}

/// Whether the item already went through a roll, including an empty one
pub fn is_rolled<H: TraitHolder + ?Sized>(item: &H) -> bool {
    item.region(ROLLED_MARKER_KEY).is_some()
}

pub fn mark_rolled<H: TraitHolder + ?Sized>(item: &mut H) {
    item.set_region(ROLLED_MARKER_KEY, Value::Bool(true));
}

/// Registered traits present on the item, in registry order
pub fn all_traits_on<H: TraitHolder + ?Sized>(
    item: &H,
    registry: &TraitRegistry,
) -> Vec<ActiveTrait> {
    let state = get(item);
    if state.is_empty() {
        return Vec::new();
    }
    registry
        .iter()
        .filter_map(|trait_def| {
            state.get(trait_def.id()).map(|level| ActiveTrait {
                trait_def: Arc::clone(trait_def),
                level: *level,
            })
        })
        .collect()
}
