//! Trait engine configuration.
//!
//! One JSON document carries the roll weights, the item whitelist, and the
//! trait definition records. Extra trait packs can be loaded from `.ron` or
//! `.json` files holding a list of records.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::constants::{
    DEFAULT_EPIC_WEIGHT, DEFAULT_LEGENDARY_WEIGHT, DEFAULT_NONE_PROBABILITY, DEFAULT_RARE_WEIGHT,
    DEFAULT_UNCOMMON_WEIGHT,
};
use crate::level::LevelTier;
use crate::store::TraitHolder;
use crate::traits::{parse_json_records, parse_ron_pack, TraitLoadReport};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid RON: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ConfigError + '_ {
    move |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Only grant traits to items produced by reward drops
    pub rewards_only: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { rewards_only: true }
    }
}

/// Relative roll weights per tier and the chance of rolling nothing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsConfig {
    pub none_probability: f64,
    pub uncommon: u32,
    pub rare: u32,
    pub epic: u32,
    pub legendary: u32,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            none_probability: DEFAULT_NONE_PROBABILITY,
            uncommon: DEFAULT_UNCOMMON_WEIGHT,
            rare: DEFAULT_RARE_WEIGHT,
            epic: DEFAULT_EPIC_WEIGHT,
            legendary: DEFAULT_LEGENDARY_WEIGHT,
        }
    }
}

impl WeightsConfig {
    pub fn tier_weight(&self, level: LevelTier) -> u32 {
        match level {
            LevelTier::None => 0,
            LevelTier::Uncommon => self.uncommon,
            LevelTier::Rare => self.rare,
            LevelTier::Epic => self.epic,
            LevelTier::Legendary => self.legendary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhitelistConfig {
    /// Accept any item the host reports as eligible; `items` is ignored
    pub allow_any: bool,
    pub items: Vec<String>,
}

impl Default for WhitelistConfig {
    fn default() -> Self {
        Self {
            allow_any: true,
            items: Vec::new(),
        }
    }
}

/// Which items may receive traits
#[derive(Debug, Clone, PartialEq)]
pub enum ItemEligibility {
    /// Defer to the host's own eligibility hint
    Any,
    Listed(HashSet<String>),
}

impl ItemEligibility {
    pub fn allows<H: TraitHolder + ?Sized>(&self, item: &H) -> bool {
        match self {
            Self::Any => item.default_eligible(),
            Self::Listed(items) => items.contains(item.item_id()),
        }
    }
}

/// Full configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraitConfig {
    pub general: GeneralConfig,
    pub weights: WeightsConfig,
    pub whitelist: WhitelistConfig,
    /// Raw trait definition records, parsed one by one
    pub traits: Vec<serde_json::Value>,
}

impl Default for TraitConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            weights: WeightsConfig::default(),
            whitelist: WhitelistConfig::default(),
            traits: default_trait_records(),
        }
    }
}

impl TraitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = self.weights.none_probability;
        if !p.is_finite() || !(0.0..1.0).contains(&p) {
            return Err(ConfigError::Invalid(format!(
                "weights.none_probability must be in [0, 1), got {p}"
            )));
        }
        if self.weights.uncommon == 0 {
            return Err(ConfigError::Invalid(
                "weights.uncommon must be greater than zero".to_string(),
            ));
        }
        if !self.whitelist.allow_any && self.whitelist.items.is_empty() {
            warn!("whitelist.allow_any is off and no items are listed; no item can receive traits");
        }
        Ok(())
    }

    pub fn eligibility(&self) -> ItemEligibility {
        if self.whitelist.allow_any {
            ItemEligibility::Any
        } else {
            ItemEligibility::Listed(self.whitelist.items.iter().cloned().collect())
        }
    }

    /// Builds the embedded trait records, skipping malformed ones
    pub fn load_traits(&self) -> TraitLoadReport {
        parse_json_records(&self.traits)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str(json).ok()
    }
}

/// Reads, parses and validates a config file
pub fn load(path: &Path) -> Result<TraitConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(io_error(path))?;
    let config: TraitConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Loads `path`, creating it with defaults when missing.
///
/// A file that does not parse is moved aside to `<stem>_<unix-seconds>.errored`
/// and replaced by the defaults. A file that parses but fails validation is
/// left alone and reported as an error.
pub fn load_or_create(path: &Path) -> Result<TraitConfig, ConfigError> {
    if !path.exists() {
        let config = TraitConfig::default();
        save(path, &config)?;
        info!(path = %path.display(), "wrote default trait config");
        return Ok(config);
    }

    let content = std::fs::read_to_string(path).map_err(io_error(path))?;
    match serde_json::from_str::<TraitConfig>(&content) {
        Ok(config) => {
            config.validate()?;
            Ok(config)
        }
        Err(e) => {
            let backup = errored_backup_path(path);
            error!(
                path = %path.display(),
                backup = %backup.display(),
                error = %e,
                "trait config is corrupt, regenerating defaults"
            );
            std::fs::rename(path, &backup).map_err(io_error(path))?;
            let config = TraitConfig::default();
            save(path, &config)?;
            Ok(config)
        }
    }
}

pub fn save(path: &Path, config: &TraitConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(io_error(path))
}

fn errored_backup_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "config".to_string());
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    path.with_file_name(format!("{stem}_{secs}.errored"))
}

/// Loads an extra trait pack; `.ron` files use RON, anything else JSON
pub fn load_trait_pack(path: &Path) -> Result<TraitLoadReport, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(io_error(path))?;
    let is_ron = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("ron"));
    if is_ron {
        Ok(parse_ron_pack(&content)?)
    } else {
        let records: Vec<serde_json::Value> = serde_json::from_str(&content)?;
        Ok(parse_json_records(&records))
    }
}

/// Starter traits written into a freshly created config
pub fn default_trait_records() -> Vec<serde_json::Value> {
    vec![
        json!({
            "id": "keen",
            "display_text": "Keen",
            "conflicts": ["dull"],
            "tiers": {
                "uncommon": { "penetration": 0.1 },
                "rare": { "penetration": 0.2 },
                "epic": { "penetration": 0.35 },
                "legendary": { "penetration": 0.5 }
            }
        }),
        json!({
            "id": "dull",
            "display_text": "Dull",
            "conflicts": ["keen"],
            "weight": 50,
            "tiers": {
                "uncommon": {
                    "penetration": -0.2,
                    "attributes": { "MainHand": { "attack_damage": [ { "kind": "add", "value": 1.0 } ] } }
                }
            }
        }),
        json!({
            "id": "sturdy",
            "display_text": "Sturdy",
            "tiers": {
                "uncommon": { "break_resistance": 0.2 },
                "rare": { "break_resistance": 0.35 },
                "epic": { "break_resistance": 0.5 },
                "legendary": { "break_resistance": 0.75 }
            }
        }),
        json!({
            "id": "heavy",
            "display_text": "Heavy",
            "tiers": {
                "uncommon": {
                    "knockback": 1.25,
                    "attributes": { "MainHand": { "attack_speed": [ { "kind": "percent_additive", "value": -0.1 } ] } }
                },
                "epic": { "knockback": 1.5 },
                "legendary": { "knockback": 2.0 }
            }
        }),
        json!({
            "id": "mighty",
            "display_text": "Mighty",
            "tiers": {
                "uncommon": { "attributes": { "MainHand": { "attack_damage": [ { "kind": "add", "value": 1.0 } ] } } },
                "rare": { "attributes": { "MainHand": { "attack_damage": [ { "kind": "add", "value": 2.0 } ] } } },
                "epic": { "attributes": { "MainHand": { "attack_damage": [ { "kind": "percent_exponential", "value": 0.15 } ] } } },
                "legendary": { "attributes": { "MainHand": { "attack_damage": [
                    { "kind": "add", "value": 2.0 },
                    { "kind": "percent_exponential", "value": 0.25 }
                ] } } }
            }
        }),
        json!({
            "id": "vital",
            "display_text": "Vital",
            "weight": 75,
            "tiers": {
                "uncommon": { "attributes": { "Body": { "max_health": [ { "kind": "add", "value": 2.0 } ] } } },
                "legendary": {
                    "attributes": { "Body": { "max_health": [ { "kind": "add", "value": 6.0 } ] } },
                    "triggered_action": "effect give @s regeneration 3 1"
                }
            }
        }),
    ]
}
