//! Shared test fixtures
//!
//! In-memory (or file-backed, for concurrency tests) SQLite pools with the
//! production schema, fake oracles with per-user fixtures, and a harness
//! bundling them with a real AdmissionController.

// Not every test binary uses every fixture
#![allow(dead_code)]

use axum::async_trait;
use medlem_common::db::models::RegistrationStatus;
use medlem_common::events::EventBus;
use medlem_reg::admission::AdmissionController;
use medlem_reg::db::events::{insert_event, NewEvent};
use medlem_reg::error::{Error, Result};
use medlem_reg::oracles::{MembershipOracle, StrikeOracle};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Membership oracle backed by a fixture map; unknown users have no groups
#[derive(Default)]
pub struct FakeMembership {
    groups: Mutex<HashMap<Uuid, HashSet<String>>>,
    fail: AtomicBool,
}

#[async_trait]
impl MembershipOracle for FakeMembership {
    async fn groups_of(&self, user_id: Uuid) -> Result<HashSet<String>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Oracle("membership service unreachable".into()));
        }
        Ok(self
            .groups
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Strike oracle backed by a fixture map; unknown users have zero strikes
#[derive(Default)]
pub struct FakeStrikes {
    counts: Mutex<HashMap<Uuid, u32>>,
    fail: AtomicBool,
}

#[async_trait]
impl StrikeOracle for FakeStrikes {
    async fn strike_count_of(&self, user_id: Uuid) -> Result<u32> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Oracle("strike service unreachable".into()));
        }
        Ok(self
            .counts
            .lock()
            .unwrap()
            .get(&user_id)
            .copied()
            .unwrap_or(0))
    }
}

/// Event fixture parameters
pub struct EventSpec {
    pub capacity: i64,
    pub allow_waitlist: bool,
    pub enforces_previous_strikes: bool,
    pub only_allow_prioritized: bool,
    pub pools: Vec<Vec<String>>,
}

impl Default for EventSpec {
    fn default() -> Self {
        Self {
            capacity: 1,
            allow_waitlist: true,
            enforces_previous_strikes: false,
            only_allow_prioritized: false,
            pools: Vec::new(),
        }
    }
}

/// Controller plus fixtures over one database
pub struct TestHarness {
    pub pool: SqlitePool,
    pub controller: Arc<AdmissionController>,
    pub membership: Arc<FakeMembership>,
    pub strikes: Arc<FakeStrikes>,
    pub bus: Arc<EventBus>,
}

impl TestHarness {
    /// Harness over an in-memory database
    pub async fn new() -> Self {
        let pool = medlem_common::db::init::init_memory_database()
            .await
            .unwrap();
        Self::with_pool(pool)
    }

    /// Harness over a file-backed database (multi-connection pool, for
    /// tests that race concurrent operations)
    pub async fn with_file_db(path: &Path) -> Self {
        let pool = medlem_common::db::init_database(path).await.unwrap();
        Self::with_pool(pool)
    }

    fn with_pool(pool: SqlitePool) -> Self {
        let membership = Arc::new(FakeMembership::default());
        let strikes = Arc::new(FakeStrikes::default());
        let bus = Arc::new(EventBus::new(256));
        let controller = Arc::new(AdmissionController::new(
            pool.clone(),
            membership.clone(),
            strikes.clone(),
            bus.clone(),
        ));
        Self {
            pool,
            controller,
            membership,
            strikes,
            bus,
        }
    }

    pub async fn create_event(&self, spec: EventSpec) -> Uuid {
        let event = insert_event(
            &self.pool,
            &NewEvent {
                title: "test event".to_string(),
                capacity: spec.capacity,
                allow_waitlist: spec.allow_waitlist,
                enforces_previous_strikes: spec.enforces_previous_strikes,
                only_allow_prioritized: spec.only_allow_prioritized,
                pools: spec.pools,
            },
        )
        .await
        .unwrap();
        event.id
    }

    pub fn grant_groups(&self, user_id: Uuid, groups: &[&str]) {
        self.membership
            .groups
            .lock()
            .unwrap()
            .insert(user_id, groups.iter().map(|g| g.to_string()).collect());
    }

    pub fn set_strikes(&self, user_id: Uuid, count: u32) {
        self.strikes.counts.lock().unwrap().insert(user_id, count);
    }

    pub fn fail_oracles(&self, fail: bool) {
        self.membership.fail.store(fail, Ordering::SeqCst);
        self.strikes.fail.store(fail, Ordering::SeqCst);
    }

    /// Register and nudge the clock so successive arrivals never share a
    /// millisecond timestamp
    pub async fn register_spaced(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<medlem_reg::admission::AdmissionOutcome> {
        let outcome = self.controller.register(event_id, user_id).await;
        tokio::time::sleep(std::time::Duration::from_millis(3)).await;
        outcome
    }

    pub async fn count_status(&self, event_id: Uuid, status: RegistrationStatus) -> i64 {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM registrations WHERE event_id = ? AND status = ?",
        )
        .bind(event_id.to_string())
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await
        .unwrap();
        count.0
    }

    /// (user_id, position) pairs of the current waitlist, position order
    pub async fn waitlist_positions(&self, event_id: Uuid) -> Vec<(Uuid, i64)> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT user_id, waitlist_position FROM registrations
            WHERE event_id = ? AND status = 'waitlisted'
            ORDER BY waitlist_position ASC
            "#,
        )
        .bind(event_id.to_string())
        .fetch_all(&self.pool)
        .await
        .unwrap();
        rows.into_iter()
            .map(|(user, pos)| (Uuid::parse_str(&user).unwrap(), pos))
            .collect()
    }

    /// User ids currently holding a seat
    pub async fn registered_users(&self, event_id: Uuid) -> HashSet<Uuid> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT user_id FROM registrations WHERE event_id = ? AND status = 'registered'",
        )
        .bind(event_id.to_string())
        .fetch_all(&self.pool)
        .await
        .unwrap();
        rows.into_iter()
            .map(|(user,)| Uuid::parse_str(&user).unwrap())
            .collect()
    }
}

/// Assert the waitlist positions are exactly 1..N with no gaps
pub fn assert_dense(positions: &[(Uuid, i64)]) {
    let got: Vec<i64> = positions.iter().map(|(_, p)| *p).collect();
    let expected: Vec<i64> = (1..=positions.len() as i64).collect();
    assert_eq!(got, expected, "waitlist positions must be dense 1..N");
}
