//! Registration row queries
//!
//! One table holds every registration attempt; cancelled rows are kept for
//! history and a fresh row is inserted on re-registration, so `created_at`
//! is always the true arrival order.

use crate::db::events::parse_uuid;
use crate::error::Result;
use medlem_common::db::models::{Registration, RegistrationStatus};
use medlem_common::time;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

/// Find the single non-cancelled registration for (event, user), if any
pub async fn find_active(
    conn: &mut SqliteConnection,
    event_id: Uuid,
    user_id: Uuid,
) -> Result<Option<Registration>> {
    let row = sqlx::query(
        r#"
        SELECT id, event_id, user_id, status, waitlist_position,
               attended_at_ms, created_at_ms, updated_at_ms
        FROM registrations
        WHERE event_id = ? AND user_id = ? AND status != 'cancelled'
        ORDER BY created_at_ms DESC
        LIMIT 1
        "#,
    )
    .bind(event_id.to_string())
    .bind(user_id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|row| row_to_registration(&row)).transpose()
}

/// Number of rows currently occupying a seat (registered or attended)
pub async fn count_occupying(conn: &mut SqliteConnection, event_id: Uuid) -> Result<i64> {
    let count: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM registrations WHERE event_id = ? AND status IN ('registered', 'attended')",
    )
    .bind(event_id.to_string())
    .fetch_one(&mut *conn)
    .await?;
    Ok(count.0)
}

/// List an event's registrations with the given status, arrival order
pub async fn list_by_status(
    conn: &mut SqliteConnection,
    event_id: Uuid,
    status: RegistrationStatus,
) -> Result<Vec<Registration>> {
    let rows = sqlx::query(
        r#"
        SELECT id, event_id, user_id, status, waitlist_position,
               attended_at_ms, created_at_ms, updated_at_ms
        FROM registrations
        WHERE event_id = ? AND status = ?
        ORDER BY created_at_ms ASC, id ASC
        "#,
    )
    .bind(event_id.to_string())
    .bind(status.as_str())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(row_to_registration).collect()
}

/// List all non-cancelled registrations for an event, arrival order
pub async fn list_active(conn: &mut SqliteConnection, event_id: Uuid) -> Result<Vec<Registration>> {
    let rows = sqlx::query(
        r#"
        SELECT id, event_id, user_id, status, waitlist_position,
               attended_at_ms, created_at_ms, updated_at_ms
        FROM registrations
        WHERE event_id = ? AND status != 'cancelled'
        ORDER BY created_at_ms ASC, id ASC
        "#,
    )
    .bind(event_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(row_to_registration).collect()
}

/// Insert a new registration row
pub async fn insert(conn: &mut SqliteConnection, registration: &Registration) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO registrations
            (id, event_id, user_id, status, waitlist_position,
             attended_at_ms, created_at_ms, updated_at_ms)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(registration.id.to_string())
    .bind(registration.event_id.to_string())
    .bind(registration.user_id.to_string())
    .bind(registration.status.as_str())
    .bind(registration.waitlist_position)
    .bind(registration.attended_at.map(|t| t.timestamp_millis()))
    .bind(registration.created_at.timestamp_millis())
    .bind(registration.updated_at.timestamp_millis())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Update status and waitlist position together
///
/// Position must be None for any status other than `Waitlisted`.
pub async fn set_status(
    conn: &mut SqliteConnection,
    registration_id: Uuid,
    status: RegistrationStatus,
    waitlist_position: Option<i64>,
) -> Result<()> {
    sqlx::query(
        "UPDATE registrations SET status = ?, waitlist_position = ?, updated_at_ms = ? WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(waitlist_position)
    .bind(time::now_ms())
    .bind(registration_id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Update only the waitlist position (dense renumbering)
pub async fn set_waitlist_position(
    conn: &mut SqliteConnection,
    registration_id: Uuid,
    position: i64,
) -> Result<()> {
    sqlx::query("UPDATE registrations SET waitlist_position = ?, updated_at_ms = ? WHERE id = ?")
        .bind(position)
        .bind(time::now_ms())
        .bind(registration_id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Event-day terminal marking
pub async fn set_attendance(
    conn: &mut SqliteConnection,
    registration_id: Uuid,
    status: RegistrationStatus,
    attended_at_ms: Option<i64>,
) -> Result<()> {
    sqlx::query(
        "UPDATE registrations SET status = ?, attended_at_ms = ?, waitlist_position = NULL, updated_at_ms = ? WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(attended_at_ms)
    .bind(time::now_ms())
    .bind(registration_id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn row_to_registration(row: &SqliteRow) -> Result<Registration> {
    Ok(Registration {
        id: parse_uuid(row.get("id"))?,
        event_id: parse_uuid(row.get("event_id"))?,
        user_id: parse_uuid(row.get("user_id"))?,
        status: row.get::<String, _>("status").parse()?,
        waitlist_position: row.get("waitlist_position"),
        attended_at: row
            .get::<Option<i64>, _>("attended_at_ms")
            .map(time::from_ms),
        created_at: time::from_ms(row.get("created_at_ms")),
        updated_at: time::from_ms(row.get("updated_at_ms")),
    })
}
