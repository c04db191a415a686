//! HTTP surface tests: router, identity middleware and error mapping,
//! exercised with in-process requests against the in-memory store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use deskline_messaging::config::Config;
use deskline_messaging::fanout::{CapturePublisher, ConnectionRegistry, EventFanout};
use deskline_messaging::routes::build_router;
use deskline_messaging::state::AppState;
use deskline_messaging::store::memory::MemoryStore;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    router: Router,
    store: MemoryStore,
    publisher: CapturePublisher,
}

fn test_app() -> TestApp {
    let store = MemoryStore::new();
    let publisher = CapturePublisher::new();
    let state = AppState {
        store: Arc::new(store.clone()),
        registry: ConnectionRegistry::new(),
        fanout: EventFanout::new(Arc::new(publisher.clone())),
        config: Arc::new(Config::test_defaults()),
    };
    TestApp {
        router: build_router().with_state(state),
        store,
        publisher,
    }
}

fn request(
    method: &str,
    uri: &str,
    tenant: Option<Uuid>,
    user: Option<Uuid>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(tenant) = tenant {
        builder = builder.header("x-tenant-id", tenant.to_string());
    }
    if let Some(user) = user {
        builder = builder.header("x-user-id", user.to_string());
    }
    match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_group(app: &TestApp, tenant: Uuid, creator: Uuid, others: &[Uuid]) -> Uuid {
    let response = app
        .router
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/conversations",
            Some(tenant),
            Some(creator),
            Some(json!({
                "kind": "group",
                "name": "order #1042",
                "participant_ids": others,
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    Uuid::parse_str(body["conversation"]["id"].as_str().unwrap()).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let app = test_app();
    let response = app
        .router
        .oneshot(request("GET", "/health", None, None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_identity_headers_are_rejected() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(request("GET", "/api/v1/conversations", None, None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Authenticated but no tenant context: a malformed request, not an
    // auth failure.
    let response = app
        .router
        .oneshot(request(
            "GET",
            "/api/v1/conversations",
            None,
            Some(Uuid::new_v4()),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "TENANT_CONTEXT_MISSING");
}

#[tokio::test]
async fn create_and_fetch_conversation() {
    let app = test_app();
    let tenant = Uuid::new_v4();
    let creator = Uuid::new_v4();
    let member = Uuid::new_v4();
    app.store.register_user(tenant, creator).await;
    app.store.register_user(tenant, member).await;

    let id = create_group(&app, tenant, creator, &[member]).await;

    let response = app
        .router
        .clone()
        .oneshot(request(
            "GET",
            &format!("/api/v1/conversations/{id}"),
            Some(tenant),
            Some(creator),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["conversation"]["kind"], "group");
    assert_eq!(body["participants"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn foreign_tenant_gets_not_found() {
    let app = test_app();
    let tenant = Uuid::new_v4();
    let creator = Uuid::new_v4();
    let member = Uuid::new_v4();
    app.store.register_user(tenant, creator).await;
    app.store.register_user(tenant, member).await;
    let id = create_group(&app, tenant, creator, &[member]).await;

    let other_tenant = Uuid::new_v4();
    let intruder = Uuid::new_v4();
    app.store.register_user(other_tenant, intruder).await;

    let response = app
        .router
        .oneshot(request(
            "GET",
            &format!("/api/v1/conversations/{id}"),
            Some(other_tenant),
            Some(intruder),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn send_message_publishes_events() {
    let app = test_app();
    let tenant = Uuid::new_v4();
    let creator = Uuid::new_v4();
    let member = Uuid::new_v4();
    app.store.register_user(tenant, creator).await;
    app.store.register_user(tenant, member).await;
    let id = create_group(&app, tenant, creator, &[member]).await;

    let response = app
        .router
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/v1/conversations/{id}/messages"),
            Some(tenant),
            Some(creator),
            Some(json!({ "content": "shipping update attached" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["sequence"], 1);
    assert_eq!(body["content"], "shipping update attached");

    // Fan-out is spawned off the request path; give it a tick.
    tokio::task::yield_now().await;
    let published = app.publisher.published().await;
    assert_eq!(published.len(), 2);
    assert!(published.iter().all(|e| e.actor_id == creator));
    assert_eq!(published[0].payload["type"], "message.sent");
    assert_eq!(published[1].payload["type"], "conversation.updated");
}

#[tokio::test]
async fn empty_message_is_a_validation_error() {
    let app = test_app();
    let tenant = Uuid::new_v4();
    let creator = Uuid::new_v4();
    let member = Uuid::new_v4();
    app.store.register_user(tenant, creator).await;
    app.store.register_user(tenant, member).await;
    let id = create_group(&app, tenant, creator, &[member]).await;

    let response = app
        .router
        .oneshot(request(
            "POST",
            &format!("/api/v1/conversations/{id}/messages"),
            Some(tenant),
            Some(creator),
            Some(json!({ "content": "   " })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn mark_read_reports_pointer_and_unread() {
    let app = test_app();
    let tenant = Uuid::new_v4();
    let creator = Uuid::new_v4();
    let member = Uuid::new_v4();
    app.store.register_user(tenant, creator).await;
    app.store.register_user(tenant, member).await;
    let id = create_group(&app, tenant, creator, &[member]).await;

    for _ in 0..2 {
        let response = app
            .router
            .clone()
            .oneshot(request(
                "POST",
                &format!("/api/v1/conversations/{id}/messages"),
                Some(tenant),
                Some(creator),
                Some(json!({ "content": "ping" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .router
        .oneshot(request(
            "POST",
            &format!("/api/v1/conversations/{id}/messages/read"),
            Some(tenant),
            Some(member),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["read_pointer"], 2);
    assert_eq!(body["unread_count"], 0);
}

#[tokio::test]
async fn listing_messages_marks_the_conversation_read() {
    let app = test_app();
    let tenant = Uuid::new_v4();
    let creator = Uuid::new_v4();
    let member = Uuid::new_v4();
    app.store.register_user(tenant, creator).await;
    app.store.register_user(tenant, member).await;
    let id = create_group(&app, tenant, creator, &[member]).await;

    for _ in 0..3 {
        let response = app
            .router
            .clone()
            .oneshot(request(
                "POST",
                &format!("/api/v1/conversations/{id}/messages"),
                Some(tenant),
                Some(creator),
                Some(json!({ "content": "update" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .router
        .clone()
        .oneshot(request(
            "GET",
            &format!("/api/v1/conversations/{id}/messages"),
            Some(tenant),
            Some(member),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await.as_array().unwrap().len(), 3);

    // Reading the page moved the member's pointer.
    let response = app
        .router
        .oneshot(request(
            "GET",
            "/api/v1/conversations",
            Some(tenant),
            Some(member),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body[0]["unread_count"], 0);
}

#[tokio::test]
async fn elevated_observer_reads_history_without_a_pointer() {
    let app = test_app();
    let tenant = Uuid::new_v4();
    let creator = Uuid::new_v4();
    let member = Uuid::new_v4();
    let supervisor = Uuid::new_v4();
    app.store.register_user(tenant, creator).await;
    app.store.register_user(tenant, member).await;
    app.store.register_user(tenant, supervisor).await;
    let id = create_group(&app, tenant, creator, &[member]).await;

    let response = app
        .router
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/v1/conversations/{id}/messages"),
            Some(tenant),
            Some(creator),
            Some(json!({ "content": "for the record" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Not a participant, so there is no read pointer to move, but the
    // page itself comes back fine.
    let mut req = request(
        "GET",
        &format!("/api/v1/conversations/{id}/messages"),
        Some(tenant),
        Some(supervisor),
        None,
    );
    req.headers_mut()
        .insert("x-elevated-role", "true".parse().unwrap());
    let response = app.router.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn typing_endpoint_accepts_and_fans_out() {
    let app = test_app();
    let tenant = Uuid::new_v4();
    let creator = Uuid::new_v4();
    let member = Uuid::new_v4();
    app.store.register_user(tenant, creator).await;
    app.store.register_user(tenant, member).await;
    let id = create_group(&app, tenant, creator, &[member]).await;

    let response = app
        .router
        .oneshot(request(
            "POST",
            &format!("/api/v1/conversations/{id}/typing"),
            Some(tenant),
            Some(member),
            Some(json!({ "is_typing": true })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    tokio::task::yield_now().await;
    let published = app.publisher.published().await;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].payload["type"], "typing");
}
