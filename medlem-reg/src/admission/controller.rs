//! Admission controller
//!
//! Owns every registration state transition. Each mutating operation runs
//! inside a single BEGIN IMMEDIATE transaction so the capacity check, the
//! classification inputs, and the resulting writes all see one consistent
//! snapshot; two racing registrations can never both take the last seat.
//! Lock contention surfaces as SQLITE_BUSY and the whole transaction is
//! retried from fresh reads, a bounded number of times with backoff.
//!
//! Notification intents are collected during the transaction and broadcast
//! only after commit; a failed broadcast never affects the committed
//! outcome.

use crate::admission::priority::{is_prioritized, PriorityProfile};
use crate::admission::ranker::{position_of, rank_waitlist, RankedEntry};
use crate::admission::swap::find_swap_target;
use crate::db::{events, registrations};
use crate::error::{Error, Result};
use crate::oracles::{MembershipOracle, StrikeOracle};
use medlem_common::db::models::{Event, PriorityPool, Registration, RegistrationStatus};
use medlem_common::events::{EventBus, RegistrationEvent};
use medlem_common::{time, uuid_utils};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Attempts per operation before lock contention is surfaced to the caller
const MAX_WRITE_ATTEMPTS: u32 = 3;
/// Base backoff between attempts, scaled linearly by attempt number
const RETRY_BACKOFF_MS: u64 = 50;

/// Outcome of a registration attempt, as callers must distinguish them
#[derive(Debug, Clone)]
pub enum AdmissionOutcome {
    /// Seat granted
    Registered(Registration),
    /// Event full; queued with a 1-based position
    Waitlisted {
        registration: Registration,
        position: i64,
    },
    /// A non-cancelled registration already existed; returned unchanged
    AlreadyRegistered(Registration),
}

/// Stateful orchestrator for the registration state machine
pub struct AdmissionController {
    db: SqlitePool,
    membership: Arc<dyn MembershipOracle>,
    strikes: Arc<dyn StrikeOracle>,
    bus: Arc<EventBus>,
}

impl AdmissionController {
    pub fn new(
        db: SqlitePool,
        membership: Arc<dyn MembershipOracle>,
        strikes: Arc<dyn StrikeOracle>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            db,
            membership,
            strikes,
            bus,
        }
    }

    /// Register a user for an event
    ///
    /// Transitions `unregistered -> registered | waitlisted`, or rejects.
    /// Idempotent: an existing non-cancelled registration is returned as-is.
    pub async fn register(&self, event_id: Uuid, user_id: Uuid) -> Result<AdmissionOutcome> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.register_once(event_id, user_id).await {
                Err(e) if e.is_lock_contention() && attempt < MAX_WRITE_ATTEMPTS => {
                    warn!(
                        "register({}, {}) hit lock contention, attempt {}/{}",
                        event_id, user_id, attempt, MAX_WRITE_ATTEMPTS
                    );
                    tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS * attempt as u64))
                        .await;
                }
                Ok((outcome, intents)) => {
                    self.emit_all(intents);
                    return Ok(outcome);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Cancel a registration
    ///
    /// A freed seat goes to the top of the combined waitlist ranking; the
    /// remainder is renumbered densely within the same transaction.
    pub async fn cancel(&self, event_id: Uuid, user_id: Uuid) -> Result<Registration> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.cancel_once(event_id, user_id).await {
                Err(e) if e.is_lock_contention() && attempt < MAX_WRITE_ATTEMPTS => {
                    warn!(
                        "cancel({}, {}) hit lock contention, attempt {}/{}",
                        event_id, user_id, attempt, MAX_WRITE_ATTEMPTS
                    );
                    tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS * attempt as u64))
                        .await;
                }
                Ok((cancelled, intents)) => {
                    self.emit_all(intents);
                    return Ok(cancelled);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Operator-chosen promotion of a waitlisted user
    ///
    /// Bypasses the ranking, but still performs the capacity check and
    /// renumbers the remaining waitlist.
    pub async fn admin_move(&self, event_id: Uuid, user_id: Uuid) -> Result<Registration> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.admin_move_once(event_id, user_id).await {
                Err(e) if e.is_lock_contention() && attempt < MAX_WRITE_ATTEMPTS => {
                    warn!(
                        "admin_move({}, {}) hit lock contention, attempt {}/{}",
                        event_id, user_id, attempt, MAX_WRITE_ATTEMPTS
                    );
                    tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS * attempt as u64))
                        .await;
                }
                Ok((promoted, intents)) => {
                    self.emit_all(intents);
                    return Ok(promoted);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Event-day terminal marking of a registered user
    pub async fn mark_attendance(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        attended: bool,
    ) -> Result<Registration> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.mark_attendance_once(event_id, user_id, attended).await {
                Err(e) if e.is_lock_contention() && attempt < MAX_WRITE_ATTEMPTS => {
                    warn!(
                        "mark_attendance({}, {}) hit lock contention, attempt {}/{}",
                        event_id, user_id, attempt, MAX_WRITE_ATTEMPTS
                    );
                    tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS * attempt as u64))
                        .await;
                }
                other => return other,
            }
        }
    }

    async fn mark_attendance_once(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        attended: bool,
    ) -> Result<Registration> {
        let mut conn = self.db.acquire().await?;
        begin_immediate(&mut conn).await?;
        let result = self
            .mark_attendance_in_txn(&mut conn, event_id, user_id, attended)
            .await;
        finish(&mut conn, result).await
    }

    // ------------------------------------------------------------------
    // Register
    // ------------------------------------------------------------------

    async fn register_once(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<(AdmissionOutcome, Vec<RegistrationEvent>)> {
        // Arriver lookups happen before the write lock is taken, and fresh
        // on every retry; occupant classification must wait for the
        // transaction's snapshot.
        let profile = self.profile_of(user_id).await?;

        let mut conn = self.db.acquire().await?;
        begin_immediate(&mut conn).await?;
        let mut intents = Vec::new();
        let result = self
            .register_in_txn(&mut conn, event_id, user_id, &profile, &mut intents)
            .await;
        let outcome = finish(&mut conn, result).await?;
        Ok((outcome, intents))
    }

    async fn register_in_txn(
        &self,
        conn: &mut SqliteConnection,
        event_id: Uuid,
        user_id: Uuid,
        profile: &PriorityProfile,
        intents: &mut Vec<RegistrationEvent>,
    ) -> Result<AdmissionOutcome> {
        let event = events::get_event(conn, event_id)
            .await?
            .ok_or(Error::EventNotFound(event_id))?;

        if let Some(existing) = registrations::find_active(conn, event_id, user_id).await? {
            info!(
                "register({}, {}): already {} - returning existing row",
                event_id, user_id, existing.status
            );
            return Ok(AdmissionOutcome::AlreadyRegistered(existing));
        }

        let pools = events::list_pools(conn, event_id).await?;
        let arriver_prioritized = is_prioritized(
            &profile.groups,
            &pools,
            profile.strike_count,
            event.enforces_previous_strikes,
        );

        if event.only_allow_prioritized && !arriver_prioritized {
            return Err(Error::NotPrioritized);
        }

        let mut classified = HashMap::new();
        classified.insert(user_id, arriver_prioritized);

        // Seat available: plain admission
        let occupied = registrations::count_occupying(conn, event_id).await?;
        if occupied < event.capacity {
            let registration = new_registration(event_id, user_id, RegistrationStatus::Registered);
            registrations::insert(conn, &registration).await?;
            info!("register({}, {}): seat granted", event_id, user_id);
            intents.push(RegistrationEvent::RegistrationConfirmed {
                user_id,
                event_id,
                timestamp: time::now(),
            });
            return Ok(AdmissionOutcome::Registered(registration));
        }

        // Full, prioritized arriver: try to displace the most recently
        // admitted non-prioritized occupant
        if arriver_prioritized {
            let seated =
                registrations::list_by_status(conn, event_id, RegistrationStatus::Registered)
                    .await?;
            let seated = self
                .classify_rows(seated, &pools, event.enforces_previous_strikes, &mut classified)
                .await?;

            if let Some(target) = find_swap_target(&seated) {
                registrations::set_status(
                    conn,
                    target.id,
                    RegistrationStatus::Waitlisted,
                    None,
                )
                .await?;
                let registration =
                    new_registration(event_id, user_id, RegistrationStatus::Registered);
                registrations::insert(conn, &registration).await?;

                let ranked = self
                    .reorder_waitlist(conn, &event, &pools, &mut classified)
                    .await?;
                let displaced_position = position_of(&ranked, target.user_id)?;
                info!(
                    "register({}, {}): swapped in, displaced {} to waitlist position {}",
                    event_id, user_id, target.user_id, displaced_position
                );
                intents.push(RegistrationEvent::SwappedToWaitlist {
                    user_id: target.user_id,
                    event_id,
                    position: displaced_position,
                    timestamp: time::now(),
                });
                intents.push(RegistrationEvent::RegistrationConfirmed {
                    user_id,
                    event_id,
                    timestamp: time::now(),
                });
                return Ok(AdmissionOutcome::Registered(registration));
            }
        }

        // Full, no swap: waitlist if the event allows it
        if event.allow_waitlist {
            let mut registration =
                new_registration(event_id, user_id, RegistrationStatus::Waitlisted);
            registrations::insert(conn, &registration).await?;
            let ranked = self
                .reorder_waitlist(conn, &event, &pools, &mut classified)
                .await?;
            let position = position_of(&ranked, user_id)?;
            registration.waitlist_position = Some(position);
            info!(
                "register({}, {}): waitlisted at position {}",
                event_id, user_id, position
            );
            intents.push(RegistrationEvent::Waitlisted {
                user_id,
                event_id,
                position,
                timestamp: time::now(),
            });
            return Ok(AdmissionOutcome::Waitlisted {
                registration,
                position,
            });
        }

        Err(Error::EventFull)
    }

    // ------------------------------------------------------------------
    // Cancel
    // ------------------------------------------------------------------

    async fn cancel_once(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<(Registration, Vec<RegistrationEvent>)> {
        let mut conn = self.db.acquire().await?;
        begin_immediate(&mut conn).await?;
        let mut intents = Vec::new();
        let result = self
            .cancel_in_txn(&mut conn, event_id, user_id, &mut intents)
            .await;
        let cancelled = finish(&mut conn, result).await?;
        Ok((cancelled, intents))
    }

    async fn cancel_in_txn(
        &self,
        conn: &mut SqliteConnection,
        event_id: Uuid,
        user_id: Uuid,
        intents: &mut Vec<RegistrationEvent>,
    ) -> Result<Registration> {
        let event = events::get_event(conn, event_id)
            .await?
            .ok_or(Error::EventNotFound(event_id))?;

        let mut registration = registrations::find_active(conn, event_id, user_id)
            .await?
            .ok_or(Error::RegistrationNotFound { event_id, user_id })?;

        let was_registered = match registration.status {
            RegistrationStatus::Registered => true,
            RegistrationStatus::Waitlisted => false,
            other => {
                return Err(Error::InvalidState(format!(
                    "cannot cancel a registration marked {}",
                    other
                )))
            }
        };

        registrations::set_status(conn, registration.id, RegistrationStatus::Cancelled, None)
            .await?;
        registration.status = RegistrationStatus::Cancelled;
        registration.waitlist_position = None;
        registration.updated_at = time::now();
        intents.push(RegistrationEvent::RegistrationCancelled {
            user_id,
            event_id,
            timestamp: time::now(),
        });

        let pools = events::list_pools(conn, event_id).await?;
        let mut classified = HashMap::new();

        if was_registered {
            let occupied = registrations::count_occupying(conn, event_id).await?;
            if occupied < event.capacity {
                // Top of the combined ranking gets the seat, no extra
                // preference beyond the existing order
                let ranked = self
                    .ranked_waitlist(conn, &event, &pools, &mut classified)
                    .await?;
                if let Some(top) = ranked.first() {
                    registrations::set_status(
                        conn,
                        top.registration.id,
                        RegistrationStatus::Registered,
                        None,
                    )
                    .await?;
                    info!(
                        "cancel({}, {}): promoted {} from waitlist",
                        event_id, user_id, top.registration.user_id
                    );
                    intents.push(RegistrationEvent::PromotedFromWaitlist {
                        user_id: top.registration.user_id,
                        event_id,
                        timestamp: time::now(),
                    });
                }
            }
        }

        // Close any gap left by the cancellation or promotion
        self.reorder_waitlist(conn, &event, &pools, &mut classified)
            .await?;

        info!("cancel({}, {}): cancelled", event_id, user_id);
        Ok(registration)
    }

    // ------------------------------------------------------------------
    // Admin move
    // ------------------------------------------------------------------

    async fn admin_move_once(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<(Registration, Vec<RegistrationEvent>)> {
        let mut conn = self.db.acquire().await?;
        begin_immediate(&mut conn).await?;
        let mut intents = Vec::new();
        let result = self
            .admin_move_in_txn(&mut conn, event_id, user_id, &mut intents)
            .await;
        let promoted = finish(&mut conn, result).await?;
        Ok((promoted, intents))
    }

    async fn admin_move_in_txn(
        &self,
        conn: &mut SqliteConnection,
        event_id: Uuid,
        user_id: Uuid,
        intents: &mut Vec<RegistrationEvent>,
    ) -> Result<Registration> {
        let event = events::get_event(conn, event_id)
            .await?
            .ok_or(Error::EventNotFound(event_id))?;

        let mut registration = registrations::find_active(conn, event_id, user_id)
            .await?
            .ok_or(Error::RegistrationNotFound { event_id, user_id })?;

        if registration.status != RegistrationStatus::Waitlisted {
            return Err(Error::InvalidState(format!(
                "only waitlisted registrations can be moved, found {}",
                registration.status
            )));
        }

        let occupied = registrations::count_occupying(conn, event_id).await?;
        if occupied >= event.capacity {
            return Err(Error::EventFull);
        }

        registrations::set_status(conn, registration.id, RegistrationStatus::Registered, None)
            .await?;
        registration.status = RegistrationStatus::Registered;
        registration.waitlist_position = None;
        registration.updated_at = time::now();

        let pools = events::list_pools(conn, event_id).await?;
        let mut classified = HashMap::new();
        self.reorder_waitlist(conn, &event, &pools, &mut classified)
            .await?;

        info!(
            "admin_move({}, {}): moved to registered",
            event_id, user_id
        );
        intents.push(RegistrationEvent::PromotedFromWaitlist {
            user_id,
            event_id,
            timestamp: time::now(),
        });
        Ok(registration)
    }

    // ------------------------------------------------------------------
    // Attendance marking
    // ------------------------------------------------------------------

    async fn mark_attendance_in_txn(
        &self,
        conn: &mut SqliteConnection,
        event_id: Uuid,
        user_id: Uuid,
        attended: bool,
    ) -> Result<Registration> {
        events::get_event(conn, event_id)
            .await?
            .ok_or(Error::EventNotFound(event_id))?;

        let mut registration = registrations::find_active(conn, event_id, user_id)
            .await?
            .ok_or(Error::RegistrationNotFound { event_id, user_id })?;

        match registration.status {
            RegistrationStatus::Registered
            | RegistrationStatus::Attended
            | RegistrationStatus::NoShow => {}
            other => {
                return Err(Error::InvalidState(format!(
                    "attendance can only be marked on a registered user, found {}",
                    other
                )))
            }
        }

        let (status, attended_at_ms) = if attended {
            (RegistrationStatus::Attended, Some(time::now_ms()))
        } else {
            (RegistrationStatus::NoShow, None)
        };
        registrations::set_attendance(conn, registration.id, status, attended_at_ms).await?;

        registration.status = status;
        registration.attended_at = attended_at_ms.map(time::from_ms);
        registration.waitlist_position = None;
        registration.updated_at = time::now();
        Ok(registration)
    }

    // ------------------------------------------------------------------
    // Shared helpers
    // ------------------------------------------------------------------

    async fn profile_of(&self, user_id: Uuid) -> Result<PriorityProfile> {
        let groups = self.membership.groups_of(user_id).await?;
        let strike_count = self.strikes.strike_count_of(user_id).await?;
        Ok(PriorityProfile {
            user_id,
            groups,
            strike_count,
        })
    }

    /// Pair each registration with its classification, caching per user so
    /// one operation never consults the oracles twice for the same user
    async fn classify_rows(
        &self,
        rows: Vec<Registration>,
        pools: &[PriorityPool],
        enforce_strikes: bool,
        classified: &mut HashMap<Uuid, bool>,
    ) -> Result<Vec<(Registration, bool)>> {
        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let prioritized = match classified.get(&row.user_id) {
                Some(known) => *known,
                None => {
                    let profile = self.profile_of(row.user_id).await?;
                    let prioritized = is_prioritized(
                        &profile.groups,
                        pools,
                        profile.strike_count,
                        enforce_strikes,
                    );
                    classified.insert(row.user_id, prioritized);
                    prioritized
                }
            };
            result.push((row, prioritized));
        }
        Ok(result)
    }

    /// Read and rank the current waitlist without persisting positions
    async fn ranked_waitlist(
        &self,
        conn: &mut SqliteConnection,
        event: &Event,
        pools: &[PriorityPool],
        classified: &mut HashMap<Uuid, bool>,
    ) -> Result<Vec<RankedEntry>> {
        let rows =
            registrations::list_by_status(conn, event.id, RegistrationStatus::Waitlisted).await?;
        let rows = self
            .classify_rows(rows, pools, event.enforces_previous_strikes, classified)
            .await?;
        Ok(rank_waitlist(rows))
    }

    /// Rank the waitlist and persist dense 1..N positions
    async fn reorder_waitlist(
        &self,
        conn: &mut SqliteConnection,
        event: &Event,
        pools: &[PriorityPool],
        classified: &mut HashMap<Uuid, bool>,
    ) -> Result<Vec<RankedEntry>> {
        let mut ranked = self.ranked_waitlist(conn, event, pools, classified).await?;
        for entry in &mut ranked {
            if entry.registration.waitlist_position != Some(entry.position) {
                registrations::set_waitlist_position(conn, entry.registration.id, entry.position)
                    .await?;
                entry.registration.waitlist_position = Some(entry.position);
            }
        }
        Ok(ranked)
    }

    fn emit_all(&self, intents: Vec<RegistrationEvent>) {
        for intent in intents {
            self.bus.emit_lossy(intent);
        }
    }
}

fn new_registration(event_id: Uuid, user_id: Uuid, status: RegistrationStatus) -> Registration {
    // Truncate to the millisecond the column stores, so the returned row
    // compares equal to what a re-read would produce
    let now = time::from_ms(time::now_ms());
    Registration {
        id: uuid_utils::generate(),
        event_id,
        user_id,
        status,
        waitlist_position: None,
        attended_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// Take the write lock up front so the capacity check and the writes that
/// follow it are serialized against other mutating operations
async fn begin_immediate(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
    Ok(())
}

/// Commit on success, roll back on error, always leaving the connection
/// clean before it returns to the pool
async fn finish<T>(conn: &mut SqliteConnection, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            if let Err(commit_err) = sqlx::query("COMMIT").execute(&mut *conn).await {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                return Err(commit_err.into());
            }
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                warn!("rollback after failed admission operation: {}", rollback_err);
            }
            Err(e)
        }
    }
}
