//! Rarity tiers for trait instances.
//!
//! Tiers are ordered: `None` is the weakest and marks "no trait". Secondary and
//! tertiary slots of a roll are derived from the primary tier by stepping down
//! the scale, floored at `None`.

use serde::{Deserialize, Serialize};

/// Rarity tier of a trait on an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelTier {
    None,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

/// Display colour hint for a tier (host maps it to its own palette)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TierColor {
    Black,
    White,
    Blue,
    LightPurple,
    Gold,
}

impl LevelTier {
    /// Every tier, `None` first
    pub const ALL: [LevelTier; 5] = [
        Self::None,
        Self::Uncommon,
        Self::Rare,
        Self::Epic,
        Self::Legendary,
    ];

    /// Tiers that can actually be granted, weakest first
    pub const LEVELS: [LevelTier; 4] = [Self::Uncommon, Self::Rare, Self::Epic, Self::Legendary];

    /// Tiers that can actually be granted, strongest first
    pub const LEVELS_DOWN: [LevelTier; 4] =
        [Self::Legendary, Self::Epic, Self::Rare, Self::Uncommon];

    pub fn ordinal(self) -> usize {
        match self {
            Self::None => 0,
            Self::Uncommon => 1,
            Self::Rare => 2,
            Self::Epic => 3,
            Self::Legendary => 4,
        }
    }

    /// Tier at `ordinal`, clamped into the scale
    pub fn from_ordinal(ordinal: usize) -> Self {
        Self::ALL[ordinal.min(Self::ALL.len() - 1)]
    }

    /// Identifier written into persisted item state
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Uncommon => "uncommon",
            Self::Rare => "rare",
            Self::Epic => "epic",
            Self::Legendary => "legendary",
        }
    }

    /// Reverse lookup of [`LevelTier::name`]. Unknown input is `None`, never an error.
    pub fn from_name(name: &str) -> Self {
        Self::LEVELS
            .iter()
            .copied()
            .find(|level| level.name() == name)
            .unwrap_or(Self::None)
    }

    pub fn is_none(self) -> bool {
        self == Self::None
    }

    pub fn color(self) -> TierColor {
        match self {
            Self::None => TierColor::Black,
            Self::Uncommon => TierColor::White,
            Self::Rare => TierColor::Blue,
            Self::Epic => TierColor::LightPurple,
            Self::Legendary => TierColor::Gold,
        }
    }

    /// One step down the scale
    pub fn secondary(self) -> Self {
        Self::from_ordinal(self.ordinal().saturating_sub(1))
    }

    /// Two steps down the scale (first tertiary slot)
    pub fn tertiary_first(self) -> Self {
        Self::from_ordinal(self.ordinal().saturating_sub(2))
    }

    /// Second tertiary slot. Same derivation as [`LevelTier::tertiary_first`].
    pub fn tertiary_second(self) -> Self {
        Self::from_ordinal(self.ordinal().saturating_sub(2))
    }
}

impl Default for LevelTier {
    fn default() -> Self {
        Self::None
    }
}

impl std::fmt::Display for LevelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
