//! HTTP API integration tests
//!
//! Drives the full router (handlers, extractors, status mapping) directly
//! via tower::Service, no socket needed.

mod helpers;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use helpers::TestHarness;
use medlem_reg::api::{build_router, AppContext};
use serde_json::{json, Value};
use tower::Service;
use uuid::Uuid;

struct TestApi {
    harness: TestHarness,
    router: Router,
}

impl TestApi {
    async fn start() -> Self {
        let harness = TestHarness::new().await;
        let router = build_router(AppContext {
            db: harness.pool.clone(),
            controller: harness.controller.clone(),
        });
        Self { harness, router }
    }

    async fn request(
        &mut self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> (StatusCode, Option<Value>) {
        let mut builder = Request::builder().method(method).uri(path);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let request = match body {
            Some(json_body) => builder.body(Body::from(json_body.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.call(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json_body = if bytes.is_empty() {
            None
        } else {
            serde_json::from_slice(&bytes).ok()
        };
        (status, json_body)
    }

    /// POST /events returning the new event id
    async fn create_event(&mut self, body: Value) -> Uuid {
        let (status, response) = self.request(Method::POST, "/events", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = response.unwrap()["event"]["id"].as_str().unwrap().to_string();
        Uuid::parse_str(&id).unwrap()
    }
}

#[tokio::test]
async fn health_reports_module_and_version() {
    let mut api = TestApi::start().await;
    let (status, body) = api.request(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["module"], "registration");
}

#[tokio::test]
async fn register_cancel_flow_over_http() {
    let mut api = TestApi::start().await;
    let event = api
        .create_event(json!({
            "title": "general assembly",
            "capacity": 1,
            "allow_waitlist": true
        }))
        .await;
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    // A takes the seat
    let (status, body) = api
        .request(
            Method::POST,
            &format!("/events/{}/registrations", event),
            Some(json!({ "user_id": a })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body.unwrap()["outcome"], "registered");

    // B queues at position 1
    let (status, body) = api
        .request(
            Method::POST,
            &format!("/events/{}/registrations", event),
            Some(json!({ "user_id": b })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let body = body.unwrap();
    assert_eq!(body["outcome"], "waitlisted");
    assert_eq!(body["position"], 1);

    // Re-registering A returns the existing row with 200
    let (status, body) = api
        .request(
            Method::POST,
            &format!("/events/{}/registrations", event),
            Some(json!({ "user_id": a })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["outcome"], "already-registered");

    // A cancels; B is promoted
    let (status, _) = api
        .request(
            Method::DELETE,
            &format!("/events/{}/registrations/{}", event, a),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = api
        .request(
            Method::GET,
            &format!("/events/{}/registrations", event),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let roster = body.unwrap();
    assert_eq!(roster["registered"][0]["user_id"], json!(b));
    assert_eq!(roster["waitlist"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn full_event_without_waitlist_returns_conflict() {
    let mut api = TestApi::start().await;
    let event = api
        .create_event(json!({
            "title": "cabin trip",
            "capacity": 1,
            "allow_waitlist": false
        }))
        .await;

    api.request(
        Method::POST,
        &format!("/events/{}/registrations", event),
        Some(json!({ "user_id": Uuid::new_v4() })),
    )
    .await;

    let (status, body) = api
        .request(
            Method::POST,
            &format!("/events/{}/registrations", event),
            Some(json!({ "user_id": Uuid::new_v4() })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.unwrap()["status"]
        .as_str()
        .unwrap()
        .starts_with("error:"));
}

#[tokio::test]
async fn unknown_event_returns_not_found() {
    let mut api = TestApi::start().await;
    let missing = Uuid::new_v4();

    let (status, _) = api
        .request(Method::GET, &format!("/events/{}", missing), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = api
        .request(
            Method::POST,
            &format!("/events/{}/registrations", missing),
            Some(json!({ "user_id": Uuid::new_v4() })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_capacity_is_rejected() {
    let mut api = TestApi::start().await;
    let (status, _) = api
        .request(
            Method::POST,
            "/events",
            Some(json!({ "title": "bad", "capacity": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn attendance_endpoint_marks_terminal_state() {
    let mut api = TestApi::start().await;
    let event = api
        .create_event(json!({
            "title": "workshop",
            "capacity": 2,
            "allow_waitlist": true
        }))
        .await;
    let user = Uuid::new_v4();

    api.request(
        Method::POST,
        &format!("/events/{}/registrations", event),
        Some(json!({ "user_id": user })),
    )
    .await;

    let (status, body) = api
        .request(
            Method::PUT,
            &format!("/events/{}/registrations/{}/attendance", event, user),
            Some(json!({ "attended": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["status"], "attended");
    assert!(!body["attended_at"].is_null());

    // The harness is still reachable for direct state checks
    let seated = api.harness.registered_users(event).await;
    assert!(seated.is_empty());
}

#[tokio::test]
async fn priority_swap_is_visible_over_http() {
    let mut api = TestApi::start().await;
    let event = api
        .create_event(json!({
            "title": "banquet",
            "capacity": 1,
            "allow_waitlist": true,
            "pools": [["board"]]
        }))
        .await;
    let regular = Uuid::new_v4();
    let insider = Uuid::new_v4();
    api.harness.grant_groups(insider, &["board"]);

    api.request(
        Method::POST,
        &format!("/events/{}/registrations", event),
        Some(json!({ "user_id": regular })),
    )
    .await;
    let (status, body) = api
        .request(
            Method::POST,
            &format!("/events/{}/registrations", event),
            Some(json!({ "user_id": insider })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body.unwrap()["outcome"], "registered");

    let (_, displaced) = api
        .request(
            Method::GET,
            &format!("/events/{}/registrations/{}", event, regular),
            None,
        )
        .await;
    let displaced = displaced.unwrap();
    assert_eq!(displaced["status"], "waitlisted");
    assert_eq!(displaced["waitlist_position"], 1);
}
