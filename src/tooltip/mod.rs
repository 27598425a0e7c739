//! Display summary of an item's traits.
//!
//! The host colours the item name by the strongest tier and lists one line per
//! trait: the first reads "with …", the rest "and …".

use serde::Serialize;

use crate::level::{LevelTier, TierColor};
use crate::store::TraitHolder;
use crate::traits::TraitRegistry;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TooltipLine {
    pub trait_id: String,
    pub display_text: String,
    pub level: LevelTier,
    pub color: TierColor,
    pub first: bool,
}

impl TooltipLine {
    pub fn render(&self) -> String {
        let joiner = if self.first { "with" } else { "and" };
        format!("{} {} {}", joiner, tier_label(self.level), self.display_text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TooltipSummary {
    pub highest: LevelTier,
    pub name_color: TierColor,
    pub lines: Vec<TooltipLine>,
}

impl TooltipSummary {
    /// Inserts the trait lines under the item name (line 0), separated from
    /// any existing description by a blank line. A tooltip without a name
    /// line is left alone.
    pub fn apply(&self, tooltip: &mut Vec<String>) {
        if tooltip.is_empty() {
            return;
        }
        let mut inject: Vec<String> = self.lines.iter().map(TooltipLine::render).collect();
        if tooltip.get(1).is_some_and(|line| !line.is_empty()) {
            inject.push(String::new());
        }
        tooltip.splice(1..1, inject);
    }
}

fn tier_label(level: LevelTier) -> &'static str {
    match level {
        LevelTier::None => "",
        LevelTier::Uncommon => "Uncommon",
        LevelTier::Rare => "Rare",
        LevelTier::Epic => "Epic",
        LevelTier::Legendary => "Legendary",
    }
}

/// Tooltip data for `item`, or `None` when it carries no registered traits
pub fn summarize<H: TraitHolder + ?Sized>(
    item: &H,
    registry: &TraitRegistry,
) -> Option<TooltipSummary> {
    let active = crate::store::all_traits_on(item, registry);
    let highest = active.iter().map(|a| a.level).max()?;

    let lines = active
        .iter()
        .enumerate()
        .map(|(i, a)| TooltipLine {
            trait_id: a.trait_def.id().to_string(),
            display_text: a.trait_def.display_text().to_string(),
            level: a.level,
            color: a.level.color(),
            first: i == 0,
        })
        .collect();

    Some(TooltipSummary {
        highest,
        name_color: highest.color(),
        lines,
    })
}
