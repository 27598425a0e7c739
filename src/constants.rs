//! Centralized constants for the trait engine.
//!
//! Per-module defaults that belong to one concern (logging filters, balance
//! sample counts) stay in their modules.

// =====================================================
// Weights
// =====================================================

/// Neutral per-trait selection weight; weights are read as percentages of this
pub const DEFAULT_TRAIT_WEIGHT: u32 = 100;

/// Number of baseline slots the empty-roll weight is sized against
pub const BASE_SLOT_COUNT: u64 = 4;

/// Default relative weight of an uncommon slot
pub const DEFAULT_UNCOMMON_WEIGHT: u32 = 40;

/// Default relative weight of a rare slot
pub const DEFAULT_RARE_WEIGHT: u32 = 10;

/// Default relative weight of an epic slot
pub const DEFAULT_EPIC_WEIGHT: u32 = 2;

/// Default relative weight of a legendary slot
pub const DEFAULT_LEGENDARY_WEIGHT: u32 = 1;

/// Default probability that a roll grants nothing
pub const DEFAULT_NONE_PROBABILITY: f64 = 0.75;

// =====================================================
// Persisted item state
// =====================================================

/// Item region holding trait id → tier identifier
pub const TRAIT_REGION_KEY: &str = "relic:traits";

/// Item region marking that the item has already been rolled
pub const ROLLED_MARKER_KEY: &str = "relic:rolled";

// =====================================================
// Host integration
// =====================================================

/// Permission level triggered actions execute with
pub const TRIGGERED_ACTION_PERMISSION: u8 = 2;

/// Penetration never exceeds a full bypass
pub const MAX_PENETRATION: f64 = 1.0;
