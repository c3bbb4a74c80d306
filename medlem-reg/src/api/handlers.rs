//! HTTP request handlers
//!
//! Implements the REST endpoints for event registration admission control.

use crate::admission::AdmissionOutcome;
use crate::api::server::AppContext;
use crate::db::events::NewEvent;
use crate::db::{events, registrations};
use crate::error::Error;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use medlem_common::db::models::{Event, Registration, RegistrationStatus};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub capacity: i64,
    #[serde(default)]
    pub allow_waitlist: bool,
    #[serde(default)]
    pub enforces_previous_strikes: bool,
    #[serde(default)]
    pub only_allow_prioritized: bool,
    /// One inner list of required group slugs per priority pool
    #[serde(default)]
    pub pools: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub event: Event,
    pub registered_count: i64,
    pub waitlist_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct RegistrationResponse {
    /// "registered" | "waitlisted" | "already-registered"
    pub outcome: String,
    pub registration: Registration,
    /// 1-based waitlist position when waitlisted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RosterResponse {
    pub registered: Vec<Registration>,
    /// Ordered by waitlist position
    pub waitlist: Vec<Registration>,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceRequest {
    pub attended: bool,
}

type HandlerError = (StatusCode, Json<StatusResponse>);

/// Map a service error onto its HTTP response, logging server-side faults
/// loudly and expected rejections at info level
fn error_response(context: &str, e: Error) -> HandlerError {
    let status = e.http_status();
    if status.is_server_error() {
        error!("{}: {}", context, e);
    } else {
        info!("{}: {}", context, e);
    }
    (
        status,
        Json(StatusResponse {
            status: format!("error: {}", e),
        }),
    )
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "registration".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Event Endpoints
// ============================================================================

/// POST /events - Create an event with its priority pools
pub async fn create_event(
    State(ctx): State<AppContext>,
    Json(req): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventResponse>), HandlerError> {
    let new = NewEvent {
        title: req.title,
        capacity: req.capacity,
        allow_waitlist: req.allow_waitlist,
        enforces_previous_strikes: req.enforces_previous_strikes,
        only_allow_prioritized: req.only_allow_prioritized,
        pools: req.pools,
    };

    match events::insert_event(&ctx.db, &new).await {
        Ok(event) => {
            info!("Created event {} ({})", event.id, event.title);
            Ok((
                StatusCode::CREATED,
                Json(EventResponse {
                    event,
                    registered_count: 0,
                    waitlist_count: 0,
                }),
            ))
        }
        Err(e) => Err(error_response("create_event", e)),
    }
}

/// GET /events/:event_id - Event with occupancy summary
pub async fn get_event(
    State(ctx): State<AppContext>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<EventResponse>, HandlerError> {
    let result: Result<EventResponse, Error> = async {
        let mut conn = ctx.db.acquire().await?;
        let event = events::get_event(&mut conn, event_id)
            .await?
            .ok_or(Error::EventNotFound(event_id))?;
        let registered_count = registrations::count_occupying(&mut conn, event_id).await?;
        let waitlist =
            registrations::list_by_status(&mut conn, event_id, RegistrationStatus::Waitlisted)
                .await?;
        Ok(EventResponse {
            event,
            registered_count,
            waitlist_count: waitlist.len() as i64,
        })
    }
    .await;

    match result {
        Ok(response) => Ok(Json(response)),
        Err(e) => Err(error_response("get_event", e)),
    }
}

// ============================================================================
// Registration Endpoints
// ============================================================================

/// POST /events/:event_id/registrations - Register a user
///
/// 201 with the admitted or waitlisted row; 200 when an existing
/// registration is returned unchanged.
pub async fn register(
    State(ctx): State<AppContext>,
    Path(event_id): Path<Uuid>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegistrationResponse>), HandlerError> {
    match ctx.controller.register(event_id, req.user_id).await {
        Ok(AdmissionOutcome::Registered(registration)) => Ok((
            StatusCode::CREATED,
            Json(RegistrationResponse {
                outcome: "registered".to_string(),
                registration,
                position: None,
            }),
        )),
        Ok(AdmissionOutcome::Waitlisted {
            registration,
            position,
        }) => Ok((
            StatusCode::CREATED,
            Json(RegistrationResponse {
                outcome: "waitlisted".to_string(),
                registration,
                position: Some(position),
            }),
        )),
        Ok(AdmissionOutcome::AlreadyRegistered(registration)) => {
            let position = registration.waitlist_position;
            Ok((
                StatusCode::OK,
                Json(RegistrationResponse {
                    outcome: "already-registered".to_string(),
                    registration,
                    position,
                }),
            ))
        }
        Err(e) => Err(error_response("register", e)),
    }
}

/// GET /events/:event_id/registrations - Registered rows plus ranked waitlist
pub async fn list_registrations(
    State(ctx): State<AppContext>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<RosterResponse>, HandlerError> {
    let result: Result<RosterResponse, Error> = async {
        let mut conn = ctx.db.acquire().await?;
        events::get_event(&mut conn, event_id)
            .await?
            .ok_or(Error::EventNotFound(event_id))?;
        let registered =
            registrations::list_by_status(&mut conn, event_id, RegistrationStatus::Registered)
                .await?;
        let mut waitlist =
            registrations::list_by_status(&mut conn, event_id, RegistrationStatus::Waitlisted)
                .await?;
        waitlist.sort_by_key(|r| r.waitlist_position);
        Ok(RosterResponse {
            registered,
            waitlist,
        })
    }
    .await;

    match result {
        Ok(response) => Ok(Json(response)),
        Err(e) => Err(error_response("list_registrations", e)),
    }
}

/// GET /events/:event_id/registrations/:user_id - Single registration
pub async fn get_registration(
    State(ctx): State<AppContext>,
    Path((event_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Registration>, HandlerError> {
    let result: Result<Registration, Error> = async {
        let mut conn = ctx.db.acquire().await?;
        events::get_event(&mut conn, event_id)
            .await?
            .ok_or(Error::EventNotFound(event_id))?;
        registrations::find_active(&mut conn, event_id, user_id)
            .await?
            .ok_or(Error::RegistrationNotFound { event_id, user_id })
    }
    .await;

    match result {
        Ok(registration) => Ok(Json(registration)),
        Err(e) => Err(error_response("get_registration", e)),
    }
}

/// DELETE /events/:event_id/registrations/:user_id - Cancel
pub async fn cancel_registration(
    State(ctx): State<AppContext>,
    Path((event_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Registration>, HandlerError> {
    match ctx.controller.cancel(event_id, user_id).await {
        Ok(cancelled) => Ok(Json(cancelled)),
        Err(e) => Err(error_response("cancel_registration", e)),
    }
}

/// POST /events/:event_id/registrations/:user_id/promote - Admin move
///
/// Operator-chosen promotion from the waitlist; bypasses the ranking but
/// not the capacity check.
pub async fn promote_registration(
    State(ctx): State<AppContext>,
    Path((event_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Registration>, HandlerError> {
    match ctx.controller.admin_move(event_id, user_id).await {
        Ok(promoted) => Ok(Json(promoted)),
        Err(e) => Err(error_response("promote_registration", e)),
    }
}

/// PUT /events/:event_id/registrations/:user_id/attendance - Terminal mark
pub async fn set_attendance(
    State(ctx): State<AppContext>,
    Path((event_id, user_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<AttendanceRequest>,
) -> Result<Json<Registration>, HandlerError> {
    match ctx
        .controller
        .mark_attendance(event_id, user_id, req.attended)
        .await
    {
        Ok(registration) => Ok(Json(registration)),
        Err(e) => Err(error_response("set_attendance", e)),
    }
}
