//! Swap target selection
//!
//! When a prioritized user arrives at a full event, picks the single
//! registered occupant to displace onto the waitlist: the most recently
//! admitted non-prioritized one. A long-standing registrant is never evicted
//! while a newer non-prioritized one exists, and a prioritized occupant is
//! never evicted at all.

use medlem_common::db::models::{Registration, RegistrationStatus};

/// Select the registration to displace for an arriving prioritized user
///
/// Input pairs each currently admitted registration with its classification
/// result; rows that are not `Registered` are ignored. Returns `None` when
/// every occupant is prioritized - the arriver is waitlisted instead.
pub fn find_swap_target(registered: &[(Registration, bool)]) -> Option<Registration> {
    let mut occupants: Vec<&(Registration, bool)> = registered
        .iter()
        .filter(|(registration, _)| registration.status == RegistrationStatus::Registered)
        .collect();

    // Most recent admission first
    occupants.sort_by(|a, b| {
        b.0.created_at
            .cmp(&a.0.created_at)
            .then_with(|| b.0.id.cmp(&a.0.id))
    });

    occupants
        .into_iter()
        .find(|(_, prioritized)| !prioritized)
        .map(|(registration, _)| registration.clone())
}
