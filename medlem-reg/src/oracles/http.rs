//! HTTP oracle adapters
//!
//! Thin clients for the membership and strike services. Any transport or
//! decode failure surfaces as `Error::Oracle` and aborts the calling
//! admission attempt.

use crate::error::{Error, Result};
use axum::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use uuid::Uuid;

use super::{MembershipOracle, StrikeOracle};

const ORACLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Membership service response for a user's groups
#[derive(Debug, Deserialize)]
struct GroupsResponse {
    groups: Vec<String>,
}

/// Strike service response for a user's strike count
#[derive(Debug, Deserialize)]
struct StrikesResponse {
    count: u32,
}

/// Membership service client
pub struct HttpMembershipOracle {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMembershipOracle {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl MembershipOracle for HttpMembershipOracle {
    async fn groups_of(&self, user_id: Uuid) -> Result<HashSet<String>> {
        let url = format!("{}/users/{}/groups", self.base_url, user_id);
        let response = self
            .client
            .get(&url)
            .timeout(ORACLE_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Oracle(format!("membership lookup failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Oracle(format!(
                "membership service returned {} for user {}",
                response.status(),
                user_id
            )));
        }

        let body: GroupsResponse = response
            .json()
            .await
            .map_err(|e| Error::Oracle(format!("membership response decode failed: {}", e)))?;
        Ok(body.groups.into_iter().collect())
    }
}

/// Strike service client
pub struct HttpStrikeOracle {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStrikeOracle {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl StrikeOracle for HttpStrikeOracle {
    async fn strike_count_of(&self, user_id: Uuid) -> Result<u32> {
        let url = format!("{}/users/{}/strikes", self.base_url, user_id);
        let response = self
            .client
            .get(&url)
            .timeout(ORACLE_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Oracle(format!("strike lookup failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Oracle(format!(
                "strike service returned {} for user {}",
                response.status(),
                user_id
            )));
        }

        let body: StrikesResponse = response
            .json()
            .await
            .map_err(|e| Error::Oracle(format!("strike response decode failed: {}", e)))?;
        Ok(body.count)
    }
}
