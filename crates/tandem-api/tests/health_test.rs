//! Health, identity and OpenAPI endpoint tests.

mod helpers;

use helpers::auth::{mint_token, register_test_user};
use helpers::{api_path, setup_test_app};
use serde_json::Value;
use uuid::Uuid;

#[tokio::test]
async fn test_liveness_and_health() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client.get("/live").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "alive");

    let response = client.get("/health").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["cache"], "memory");
}

#[tokio::test]
async fn test_me_mirrors_token_profile() {
    let app = setup_test_app().await;
    let client = app.client();
    let user = register_test_user(client, "alice").await;

    let me: Value = client
        .get(&api_path("/me"))
        .add_header("Authorization", user.bearer())
        .await
        .json();
    assert_eq!(me["id"], user.user_id.to_string());
    assert_eq!(me["username"], "alice");
}

#[tokio::test]
async fn test_username_taken_by_another_subject_conflicts() {
    let app = setup_test_app().await;
    let client = app.client();
    register_test_user(client, "alice").await;

    let impostor = mint_token(Uuid::new_v4(), "alice");
    let response = client
        .get(&api_path("/me"))
        .add_header("Authorization", format!("Bearer {}", impostor))
        .await;
    assert_eq!(response.status_code(), 409);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = setup_test_app().await;

    let response = app.client().get("/api/openapi.json").await;
    assert_eq!(response.status_code(), 200);
    let spec: Value = response.json();
    assert!(spec["paths"]["/api/v1/workspaces"].is_object());
}

#[tokio::test]
async fn test_responses_carry_request_id_and_security_headers() {
    let app = setup_test_app().await;

    let response = app.client().get("/live").await;
    assert!(response.maybe_header("x-request-id").is_some());
    assert_eq!(response.header("x-content-type-options"), "nosniff");
}
