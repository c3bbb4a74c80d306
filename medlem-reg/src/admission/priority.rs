//! Priority classification
//!
//! Decides whether one user is "prioritized" for one event. Pure and total:
//! no I/O, never fails. The strike veto takes precedence over any pool
//! match - a user at or above the threshold is never prioritized, whatever
//! groups they hold.

use medlem_common::db::models::PriorityPool;
use std::collections::HashSet;
use uuid::Uuid;

/// Strike count at which the veto applies (when the event enforces strikes)
pub const STRIKE_VETO_THRESHOLD: u32 = 3;

/// Oracle-resolved inputs for classifying one user
#[derive(Debug, Clone)]
pub struct PriorityProfile {
    pub user_id: Uuid,
    pub groups: HashSet<String>,
    pub strike_count: u32,
}

/// Whether a user is prioritized for an event
///
/// True iff the strike veto does not apply and at least one pool with a
/// non-empty group set has ALL of its groups among the user's groups.
/// A pool with zero groups matches nobody.
pub fn is_prioritized(
    user_groups: &HashSet<String>,
    pools: &[PriorityPool],
    strike_count: u32,
    enforce_strikes: bool,
) -> bool {
    if enforce_strikes && strike_count >= STRIKE_VETO_THRESHOLD {
        return false;
    }

    pools.iter().any(|pool| {
        !pool.groups.is_empty() && pool.groups.iter().all(|group| user_groups.contains(group))
    })
}
