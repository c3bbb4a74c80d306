//! Membership and strike oracles
//!
//! External services consulted during classification. Oracle failure aborts
//! the admission attempt - a prioritization decision is never made on
//! missing data, because it feeds directly into capacity-safety decisions.

pub mod http;

use crate::error::Result;
use axum::async_trait;
use std::collections::HashSet;
use uuid::Uuid;

pub use http::{HttpMembershipOracle, HttpStrikeOracle};

/// Resolves the group memberships of a user
#[async_trait]
pub trait MembershipOracle: Send + Sync {
    /// Set of group slugs the user belongs to
    async fn groups_of(&self, user_id: Uuid) -> Result<HashSet<String>>;
}

/// Resolves a user's current disciplinary strike count
#[async_trait]
pub trait StrikeOracle: Send + Sync {
    async fn strike_count_of(&self, user_id: Uuid) -> Result<u32>;
}
