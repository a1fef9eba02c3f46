//! Workflow helpers for integration tests (create workspace → invite → channel, etc.).

use axum_test::TestServer;
use serde_json::{json, Value};
use uuid::Uuid;

use super::api_path;
use super::auth::TestUser;

pub fn id_of(value: &Value) -> Uuid {
    Uuid::parse_str(
        value
            .get("id")
            .and_then(|v| v.as_str())
            .expect("Expected 'id' in response"),
    )
    .expect("Invalid UUID in response")
}

/// Import `repository` as a workspace owned by `owner`; returns the workspace document.
pub async fn create_workspace(client: &TestServer, owner: &TestUser, repository: &str) -> Value {
    let response = client
        .post(&api_path("/workspaces"))
        .add_header("Authorization", owner.bearer())
        .json(&json!({ "repository": repository, "tags": ["Rust", "rust", " realtime "] }))
        .await;
    assert_eq!(response.status_code(), 201, "create workspace");
    response.json()
}

/// Id of the workspace's `general` channel
pub fn general_channel_id(workspace: &Value) -> Uuid {
    let channels = workspace["channels"].as_array().expect("channels array");
    let general = channels
        .iter()
        .find(|c| c["name"] == "general")
        .expect("general channel");
    id_of(general)
}

/// Invite `member` into `workspace_id` with `role`
pub async fn add_member(
    client: &TestServer,
    actor: &TestUser,
    workspace_id: Uuid,
    member: &TestUser,
    role: &str,
) -> Value {
    let response = client
        .post(&api_path(&format!("/workspaces/{}/members", workspace_id)))
        .add_header("Authorization", actor.bearer())
        .json(&json!({ "username": member.username, "role": role }))
        .await;
    assert_eq!(response.status_code(), 201, "add member {}", member.username);
    response.json()
}

pub async fn create_channel(
    client: &TestServer,
    actor: &TestUser,
    workspace_id: Uuid,
    name: &str,
    is_private: bool,
) -> Value {
    let response = client
        .post(&api_path(&format!("/workspaces/{}/channels", workspace_id)))
        .add_header("Authorization", actor.bearer())
        .json(&json!({ "name": name, "is_private": is_private }))
        .await;
    assert_eq!(response.status_code(), 201, "create channel {}", name);
    response.json()
}

pub async fn send_message(
    client: &TestServer,
    actor: &TestUser,
    channel_id: Uuid,
    content: &str,
) -> Value {
    let response = client
        .post(&api_path(&format!("/channels/{}/messages", channel_id)))
        .add_header("Authorization", actor.bearer())
        .json(&json!({ "content": content }))
        .await;
    assert_eq!(response.status_code(), 201, "send message");
    response.json()
}
