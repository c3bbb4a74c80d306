//! Waitlist ranking
//!
//! Produces the total order over an event's waitlisted registrations:
//! prioritized before non-prioritized, earliest arrival first within each
//! class, row id as the final tiebreak so the order is fully deterministic.
//! Positions are 1-based and dense (no duplicates, no gaps).

use crate::error::{Error, Result};
use medlem_common::db::models::{Registration, RegistrationStatus};
use tracing::error;
use uuid::Uuid;

/// One waitlisted registration with its computed rank
#[derive(Debug, Clone)]
pub struct RankedEntry {
    pub registration: Registration,
    pub prioritized: bool,
    /// 1-based position in the combined ordering
    pub position: i64,
}

/// Rank an event's waitlist
///
/// Input pairs each waitlisted registration with its classification result;
/// rows that are not `Waitlisted` are ignored. The returned list is ordered
/// by position.
pub fn rank_waitlist(entries: Vec<(Registration, bool)>) -> Vec<RankedEntry> {
    let mut entries: Vec<(Registration, bool)> = entries
        .into_iter()
        .filter(|(registration, _)| registration.status == RegistrationStatus::Waitlisted)
        .collect();

    entries.sort_by_key(|(registration, prioritized)| {
        (!*prioritized, registration.created_at, registration.id)
    });

    entries
        .into_iter()
        .enumerate()
        .map(|(index, (registration, prioritized))| RankedEntry {
            registration,
            prioritized,
            position: index as i64 + 1,
        })
        .collect()
}

/// Position of one user within a ranked waitlist
///
/// Querying a user with no waitlisted registration is a programming error on
/// the caller's side, not a normal outcome: it is logged loudly and surfaced
/// as a contract violation, distinct from "user is not prioritized".
pub fn position_of(ranked: &[RankedEntry], user_id: Uuid) -> Result<i64> {
    match ranked
        .iter()
        .find(|entry| entry.registration.user_id == user_id)
    {
        Some(entry) => Ok(entry.position),
        None => {
            error!(
                "waitlist position queried for user {} with no waitlisted registration",
                user_id
            );
            Err(Error::Contract(format!(
                "user {} has no waitlisted registration",
                user_id
            )))
        }
    }
}
