//! Database models

use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle state of a registration
///
/// Stored as TEXT in the registrations table. `Cancelled` and `NoShow` rows
/// never hold a waitlist position and never count against event capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Registered,
    Waitlisted,
    Cancelled,
    Attended,
    NoShow,
}

impl RegistrationStatus {
    /// Column value for this status
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Registered => "registered",
            RegistrationStatus::Waitlisted => "waitlisted",
            RegistrationStatus::Cancelled => "cancelled",
            RegistrationStatus::Attended => "attended",
            RegistrationStatus::NoShow => "no_show",
        }
    }

    /// Whether this row still represents an active claim on the event
    /// (registered, waitlisted, or an event-day terminal state)
    pub fn is_active(&self) -> bool {
        !matches!(self, RegistrationStatus::Cancelled)
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registered" => Ok(RegistrationStatus::Registered),
            "waitlisted" => Ok(RegistrationStatus::Waitlisted),
            "cancelled" => Ok(RegistrationStatus::Cancelled),
            "attended" => Ok(RegistrationStatus::Attended),
            "no_show" => Ok(RegistrationStatus::NoShow),
            other => Err(Error::InvalidInput(format!(
                "unknown registration status: {}",
                other
            ))),
        }
    }
}

/// An event with finite capacity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    /// Maximum number of concurrently `registered` rows
    pub capacity: i64,
    /// Whether arrivals beyond capacity may queue on the waitlist
    pub allow_waitlist: bool,
    /// Whether the strike veto applies when classifying priority
    pub enforces_previous_strikes: bool,
    /// Whether non-prioritized users are rejected outright
    pub only_allow_prioritized: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A set of group slugs granting priority on one event
///
/// A user matches a pool only by belonging to every group in it. A pool with
/// zero groups matches nobody.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityPool {
    pub id: Uuid,
    pub event_id: Uuid,
    pub groups: Vec<String>,
}

/// One registration attempt by one user on one event
///
/// `created_at` is the immutable arrival timestamp used as the FIFO
/// tiebreaker. Re-registering after a cancellation creates a new row, so
/// arrival order is always the true arrival order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub status: RegistrationStatus,
    /// 1-based rank, meaningful only while `status` is `Waitlisted`
    pub waitlist_position: Option<i64>,
    pub attended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
