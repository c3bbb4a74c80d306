//! Event and priority pool queries

use crate::error::{Error, Result};
use medlem_common::db::models::{Event, PriorityPool};
use medlem_common::{time, uuid_utils};
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

/// Input for event creation
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub capacity: i64,
    pub allow_waitlist: bool,
    pub enforces_previous_strikes: bool,
    pub only_allow_prioritized: bool,
    /// One inner vec of group slugs per priority pool
    pub pools: Vec<Vec<String>>,
}

/// Insert an event with its priority pools
pub async fn insert_event(db: &SqlitePool, new: &NewEvent) -> Result<Event> {
    if new.capacity < 1 {
        return Err(Error::InvalidInput(format!(
            "capacity must be positive, got {}",
            new.capacity
        )));
    }
    if new.title.trim().is_empty() {
        return Err(Error::InvalidInput("title must not be empty".to_string()));
    }

    let now_ms = time::now_ms();
    let event = Event {
        id: uuid_utils::generate(),
        title: new.title.clone(),
        capacity: new.capacity,
        allow_waitlist: new.allow_waitlist,
        enforces_previous_strikes: new.enforces_previous_strikes,
        only_allow_prioritized: new.only_allow_prioritized,
        created_at: time::from_ms(now_ms),
        updated_at: time::from_ms(now_ms),
    };

    let mut tx = db.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO events
            (id, title, capacity, allow_waitlist, enforces_previous_strikes,
             only_allow_prioritized, created_at_ms, updated_at_ms)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(event.id.to_string())
    .bind(&event.title)
    .bind(event.capacity)
    .bind(event.allow_waitlist)
    .bind(event.enforces_previous_strikes)
    .bind(event.only_allow_prioritized)
    .bind(now_ms)
    .bind(now_ms)
    .execute(&mut *tx)
    .await?;

    for groups in &new.pools {
        sqlx::query("INSERT INTO priority_pools (id, event_id, groups) VALUES (?, ?, ?)")
            .bind(uuid_utils::generate().to_string())
            .bind(event.id.to_string())
            .bind(serde_json::to_string(groups).map_err(|e| Error::Internal(e.to_string()))?)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(event)
}

/// Get event by ID
pub async fn get_event(conn: &mut SqliteConnection, event_id: Uuid) -> Result<Option<Event>> {
    let row = sqlx::query(
        r#"
        SELECT id, title, capacity, allow_waitlist, enforces_previous_strikes,
               only_allow_prioritized, created_at_ms, updated_at_ms
        FROM events
        WHERE id = ?
        "#,
    )
    .bind(event_id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|row| {
        Ok(Event {
            id: parse_uuid(row.get("id"))?,
            title: row.get("title"),
            capacity: row.get("capacity"),
            allow_waitlist: row.get("allow_waitlist"),
            enforces_previous_strikes: row.get("enforces_previous_strikes"),
            only_allow_prioritized: row.get("only_allow_prioritized"),
            created_at: time::from_ms(row.get("created_at_ms")),
            updated_at: time::from_ms(row.get("updated_at_ms")),
        })
    })
    .transpose()
}

/// List an event's priority pools
pub async fn list_pools(conn: &mut SqliteConnection, event_id: Uuid) -> Result<Vec<PriorityPool>> {
    let rows = sqlx::query("SELECT id, event_id, groups FROM priority_pools WHERE event_id = ?")
        .bind(event_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter()
        .map(|row| {
            let groups: Vec<String> = serde_json::from_str(row.get::<String, _>("groups").as_str())
                .map_err(|e| Error::Internal(format!("corrupt pool groups column: {}", e)))?;
            Ok(PriorityPool {
                id: parse_uuid(row.get("id"))?,
                event_id: parse_uuid(row.get("event_id"))?,
                groups,
            })
        })
        .collect()
}

pub(crate) fn parse_uuid(value: String) -> Result<Uuid> {
    uuid_utils::parse(&value).map_err(|e| Error::Internal(format!("corrupt uuid column: {}", e)))
}
