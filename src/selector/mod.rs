//! Weighted draw over a combination pool.

use rand::Rng;

use crate::pool::{Assignment, CombinationPool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
    #[error("combination pool has zero total weight")]
    ZeroTotalWeight,
}

/// Draws one assignment.
///
/// Reward draws halve the draw range, so entries late in pool order (the
/// empty assignment is last) lose probability mass to earlier ones.
pub fn draw<'p, R: Rng + ?Sized>(
    pool: &'p CombinationPool,
    rng: &mut R,
    is_reward: bool,
) -> Result<&'p Assignment, SelectError> {
    let mut total = pool.total_weight();
    if is_reward {
        total /= 2;
    }
    if total == 0 {
        return Err(SelectError::ZeroTotalWeight);
    }

    let roll = rng.gen_range(0..total);
    let mut accumulated = 0u64;
    for entry in pool.entries() {
        accumulated = accumulated.saturating_add(entry.weight);
        if accumulated > roll {
            return Ok(entry);
        }
    }

    pool.entries().last().ok_or(SelectError::ZeroTotalWeight)
}
