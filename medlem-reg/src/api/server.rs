//! HTTP server setup and routing
//!
//! Sets up the Axum server with the registration routes. Authorization is
//! the permission service's concern and sits in front of this service; the
//! routes here compute admission outcomes, not access decisions.

use crate::admission::AdmissionController;
use crate::error::Result;
use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
///
/// AppContext implements Clone, which gives us `FromRef<AppContext>` for
/// free via Axum's blanket implementation.
#[derive(Clone)]
pub struct AppContext {
    pub db: SqlitePool,
    pub controller: Arc<AdmissionController>,
}

/// Build application router
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))
        // Event surface (creation is thin glue so the service is drivable)
        .route("/events", post(super::handlers::create_event))
        .route("/events/:event_id", get(super::handlers::get_event))
        // Registration surface
        .route(
            "/events/:event_id/registrations",
            post(super::handlers::register).get(super::handlers::list_registrations),
        )
        .route(
            "/events/:event_id/registrations/:user_id",
            get(super::handlers::get_registration).delete(super::handlers::cancel_registration),
        )
        .route(
            "/events/:event_id/registrations/:user_id/promote",
            post(super::handlers::promote_registration),
        )
        .route(
            "/events/:event_id/registrations/:user_id/attendance",
            put(super::handlers::set_attendance),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

/// Run HTTP API server
pub async fn run(bind_addr: &str, ctx: AppContext) -> Result<()> {
    let app = build_router(ctx);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("medlem-reg listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
