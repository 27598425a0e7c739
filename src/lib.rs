//! Relic Traits - Item Trait Engine
//!
//! This crate provides the deterministic logic for rarity-tiered item traits:
//! - Trait definitions, registry and config-driven loading
//! - Weighted combination pool (up to four traits per item)
//! - Weighted selection with reward halving
//! - Per-item trait storage over a host's tag regions
//! - Effect resolution (knockback, durability, attributes, triggered actions)
//! - Attribute modifier folding
//! - Armour-penetration damage splitting
//! - Tooltip summaries
//! - Hot-reload and Monte-Carlo balance tooling

pub mod balance;
pub mod compositor;
pub mod config;
pub mod constants;
pub mod effect;
pub mod engine;
pub mod hotreload;
pub mod level;
pub mod logging;
pub mod penetration;
pub mod pool;
pub mod resolver;
pub mod selector;
pub mod store;
pub mod tooltip;
pub mod traits;
