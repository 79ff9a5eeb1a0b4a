//! HTTP round-trips against the full router over the in-memory store.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use lims_sdk::{common_routes_with_ready, entity_routes, AppState, MemoryStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    let state = AppState::new(Arc::new(MemoryStore::new()));
    Router::new()
        .merge(common_routes_with_ready(state.clone()))
        .nest("/api", entity_routes(state))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(v) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            builder.body(Body::from(v.to_string())).unwrap()
        }
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn sop_body(version: &str) -> Value {
    json!({
        "sop_name": "SOP-7",
        "version_number": version,
        "effective_date": "2024-01-01"
    })
}

async fn create_sop(app: &Router) -> String {
    let (status, body) = send(app, Method::POST, "/api/sops", Some(sop_body("1.0"))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_ready_and_version() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, _) = send(&app, Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, "/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "lims-sdk");
}

#[tokio::test]
async fn create_then_read_roundtrip() {
    let app = app();
    let id = create_sop(&app).await;

    let (status, body) = send(&app, Method::GET, &format!("/api/sops/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["sop_name"], "SOP-7");
    assert_eq!(body["data"]["version_number"], "1.0");

    let (status, body) = send(&app, Method::GET, "/api/sops", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], 1);
}

#[tokio::test]
async fn rename_is_silent_but_version_bump_is_audited() {
    let app = app();
    let id = create_sop(&app).await;

    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/api/sops/{id}"),
        Some(json!({ "sop_name": "SOP-8" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, Method::GET, "/api/version-changes", None).await;
    assert_eq!(body["meta"]["count"], 0);

    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/api/sops/{id}"),
        Some(json!({ "version_number": "1.1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, Method::GET, "/api/version-changes", None).await;
    assert_eq!(body["meta"]["count"], 1);
    let change = &body["data"][0];
    assert_eq!(change["old_version_number"], "1.0");
    assert_eq!(change["new_version_number"], "1.1");
    assert_eq!(change["sop"], id);
}

#[tokio::test]
async fn version_changes_are_append_only_over_http() {
    let app = app();
    let id = create_sop(&app).await;
    send(
        &app,
        Method::PATCH,
        &format!("/api/sops/{id}"),
        Some(json!({ "version_number": "2.0" })),
    )
    .await;
    let (_, body) = send(&app, Method::GET, "/api/version-changes", None).await;
    let change_id = body["data"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/version-changes",
        Some(json!({ "sop": id })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/api/version-changes/{change_id}"),
        Some(json!({ "new_version_number": "9.9" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/version-changes/{change_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/version-changes/{change_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn dangling_reference_is_unprocessable() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/warehouses",
        Some(json!({
            "sop": uuid::Uuid::new_v4().to_string(),
            "warehouse_technician": "R. Vance",
            "warehouse_facility": "Building 4",
            "warehouse_company": "Acme Pharma"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "foreign_key_violation");

    let (_, body) = send(&app, Method::GET, "/api/warehouses", None).await;
    assert_eq!(body["meta"]["count"], 0);
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let app = app();
    let user = json!({
        "account_username": "dreyes",
        "first_name": "Dana",
        "last_name": "Reyes",
        "phone": "555-0100",
        "email": "dreyes@lab.example",
        "department": "QC"
    });
    let (status, _) = send(&app, Method::POST, "/api/users", Some(user.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let mut second = user;
    second["account_username"] = json!("dreyes2");
    let (status, body) = send(&app, Method::POST, "/api/users", Some(second)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "unique_constraint_violation");
}

#[tokio::test]
async fn delete_cascades_over_http() {
    let app = app();
    let sop = create_sop(&app).await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/warehouses",
        Some(json!({
            "sop": sop,
            "warehouse_technician": "R. Vance",
            "warehouse_facility": "Building 4",
            "warehouse_company": "Acme Pharma"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/sops/{sop}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&app, Method::GET, "/api/warehouses", None).await;
    assert_eq!(body["meta"]["count"], 0);
    let (status, _) = send(&app, Method::GET, &format!("/api/sops/{sop}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn validation_and_routing_failures() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/api/widgets", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, body) = send(&app, Method::GET, "/api/sops/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/sops",
        Some(json!({ "sop_name": "SOP-7", "version_number": "1.0" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "validation_error");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/sops",
        Some(json!({ "sop_name": "SOP-7", "version_number": "1.0", "effective_date": "2024-01-01", "surprise": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn list_filters_match_exactly() {
    let app = app();
    create_sop(&app).await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/sops",
        Some(json!({
            "sop_name": "SOP-9",
            "version_number": "4.0",
            "effective_date": "2024-06-01"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = send(&app, Method::GET, "/api/sops?sop_name=SOP-9", None).await;
    assert_eq!(body["meta"]["count"], 1);
    assert_eq!(body["data"][0]["version_number"], "4.0");

    let (_, body) = send(&app, Method::GET, "/api/sops?limit=1", None).await;
    assert_eq!(body["meta"]["count"], 1);
}
