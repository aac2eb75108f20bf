use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use db::DBService;
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde_json::{Value, json};
use server::AppState;
use services::services::{
    ai_query::AiQueryClient,
    auth_events::AuthEvents,
    config::{AiConfig, StorageConfig},
    storage::StorageClient,
};
use tower::ServiceExt;

async fn test_state() -> AppState {
    let db = DBService::new_in_memory().await.unwrap();
    let storage = StorageClient::new(&StorageConfig {
        base_url: "http://127.0.0.1:9/storage/v1/".to_string(),
        service_key: SecretString::from("test-key".to_string()),
        bucket: "project-files".to_string(),
    })
    .unwrap();
    let ai = AiQueryClient::new(&AiConfig {
        endpoint_url: "http://127.0.0.1:9/functions/v1/ai-analyze".to_string(),
    })
    .unwrap();
    AppState::new(db, storage, ai, AuthEvents::default())
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    }
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, read_json(response).await)
}

async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, read_json(response).await)
}

async fn upload(app: &Router, uri: &str, file_name: &str) -> (StatusCode, Value) {
    let boundary = "test-boundary-7MA4YWxkTrZu0gW";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         name,count\nalpha,1\n\r\n\
         --{boundary}--\r\n"
    );
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, read_json(response).await)
}

async fn sign_in(app: &Router, id: &str) -> Value {
    let (status, body) = send_json(
        app,
        "POST",
        "/api/auth/sign-in",
        json!({"id": id, "display_name": "Test User", "email": "user@example.com"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

async fn expire_trial(state: &AppState, id: &str) {
    sqlx::query("UPDATE profiles SET trial_ends_at = $2 WHERE id = $1")
        .bind(id)
        .bind(Utc::now() - Duration::days(30))
        .execute(&state.db().pool)
        .await
        .unwrap();
}

async fn create_project(app: &Router, profile_id: &str, name: &str) -> String {
    let (status, body) = send_json(
        app,
        "POST",
        "/api/projects",
        json!({"profile_id": profile_id, "name": name, "description": "test project"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn sign_in_provisions_profile_with_trial() {
    let app = server::router(test_state().await);

    let body = sign_in(&app, "u1").await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["profile"]["id"], "u1");
    assert_eq!(body["data"]["profile"]["is_subscribed"], false);
    assert!(body["data"]["profile"]["trial_ends_at"].is_string());
    assert_eq!(body["data"]["entitlement"]["is_trial_active"], true);
    assert_eq!(body["data"]["entitlement"]["remaining_trial_days"], 15);
    assert_eq!(body["data"]["entitlement"]["phase"], "trial");

    // Signing in again neither duplicates the profile nor moves the window.
    let again = sign_in(&app, "u1").await;
    assert_eq!(
        body["data"]["profile"]["trial_ends_at"],
        again["data"]["profile"]["trial_ends_at"]
    );
}

#[tokio::test]
async fn sign_in_requires_identity_id() {
    let app = server::router(test_state().await);
    let (status, body) = send_json(&app, "POST", "/api/auth/sign-in", json!({"id": "  "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn entitlement_fails_closed_for_unknown_identity() {
    let app = server::router(test_state().await);

    let (status, body) = send(&app, "GET", "/api/profiles/ghost/entitlement").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_subscribed"], false);
    assert_eq!(body["data"]["is_trial_active"], false);
    assert_eq!(body["data"]["is_trial_expired"], true);
    assert_eq!(body["data"]["remaining_trial_days"], 0);
    assert_eq!(body["data"]["phase"], "expired");
}

#[tokio::test]
async fn unknown_profile_is_not_found() {
    let app = server::router(test_state().await);
    let (status, body) = send(&app, "GET", "/api/profiles/ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn subscription_overrides_expired_trial() {
    let state = test_state().await;
    let app = server::router(state.clone());

    sign_in(&app, "u2").await;
    expire_trial(&state, "u2").await;

    let (_, before) = send(&app, "GET", "/api/profiles/u2/entitlement").await;
    assert_eq!(before["data"]["phase"], "expired");

    let (status, body) = send_json(
        &app,
        "PUT",
        "/api/profiles/u2/subscription",
        json!({"is_subscribed": true}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_subscribed"], true);

    let (_, after) = send(&app, "GET", "/api/profiles/u2/entitlement").await;
    assert_eq!(after["data"]["phase"], "subscribed");
    assert_eq!(after["data"]["is_trial_expired"], false);
    assert_eq!(after["data"]["remaining_trial_days"], Value::Null);
}

#[tokio::test]
async fn expired_trial_gates_ai_query_with_trial_end_date() {
    let state = test_state().await;
    let app = server::router(state.clone());

    sign_in(&app, "u3").await;
    let project_id = create_project(&app, "u3", "Battle Plans").await;
    expire_trial(&state, "u3").await;

    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/api/projects/{project_id}/ai-query"),
        json!({"profile_id": "u3", "query": "what is in my data?"}),
    )
    .await;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["success"], false);
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("trial ended on"), "message: {message}");
    assert!(message.contains("Subscribe"), "message: {message}");
    assert_eq!(body["data"]["phase"], "expired");
}

#[tokio::test]
async fn expired_trial_gates_upload() {
    let state = test_state().await;
    let app = server::router(state.clone());

    sign_in(&app, "u4").await;
    let project_id = create_project(&app, "u4", "Uploads").await;
    expire_trial(&state, "u4").await;

    let (status, body) = upload(
        &app,
        &format!("/api/projects/{project_id}/files?profile_id=u4"),
        "sales.csv",
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn subscribed_profile_clears_the_upload_gate() {
    let state = test_state().await;
    let app = server::router(state.clone());

    sign_in(&app, "u5").await;
    expire_trial(&state, "u5").await;
    send_json(
        &app,
        "PUT",
        "/api/profiles/u5/subscription",
        json!({"is_subscribed": true}),
    )
    .await;
    let project_id = create_project(&app, "u5", "Premium").await;

    // A non-CSV upload gets past the entitlement gate and fails on
    // validation instead of on subscription.
    let (status, body) = upload(
        &app,
        &format!("/api/projects/{project_id}/files?profile_id=u5"),
        "notes.txt",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["message"].as_str().unwrap().contains(".csv"),
        "message: {:?}",
        body["message"]
    );
}

#[tokio::test]
async fn ai_query_checks_project_ownership() {
    let app = server::router(test_state().await);

    sign_in(&app, "u6").await;
    sign_in(&app, "u7").await;
    let project_id = create_project(&app, "u6", "Mine").await;

    let (status, _) = send_json(
        &app,
        "POST",
        &format!("/api/projects/{project_id}/ai-query"),
        json!({"profile_id": "u7", "query": "spy on someone else's data"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn project_crud_roundtrip() {
    let app = server::router(test_state().await);

    sign_in(&app, "u8").await;
    let project_id = create_project(&app, "u8", "Roundtrip").await;

    let (status, list) = send(&app, "GET", "/api/projects?profile_id=u8").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["data"].as_array().unwrap().len(), 1);
    assert_eq!(list["data"][0]["id"].as_str().unwrap(), project_id);

    let (status, fetched) = send(&app, "GET", &format!("/api/projects/{project_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"]["name"], "Roundtrip");

    let (status, _) = send(&app, "DELETE", &format!("/api/projects/{project_id}")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", &format!("/api/projects/{project_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_project_name_is_rejected() {
    let app = server::router(test_state().await);
    sign_in(&app, "u9").await;

    let (status, _) = send_json(
        &app,
        "POST",
        "/api/projects",
        json!({"profile_id": "u9", "name": "   ", "description": null}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
