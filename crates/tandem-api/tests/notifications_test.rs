//! Notification inbox integration tests.

mod helpers;

use helpers::auth::register_test_user;
use helpers::workflows::{add_member, create_workspace, id_of};
use helpers::{api_path, setup_test_app};
use serde_json::{json, Value};

#[tokio::test]
async fn test_invite_and_role_change_notify_member() {
    let app = setup_test_app().await;
    let client = app.client();
    let owner = register_test_user(client, "alice").await;
    let bob = register_test_user(client, "bob").await;
    let workspace_id = id_of(&create_workspace(client, &owner, "acme/widgets").await);
    add_member(client, &owner, workspace_id, &bob, "viewer").await;

    client
        .patch(&api_path(&format!("/workspaces/{}/members/{}", workspace_id, bob.user_id)))
        .add_header("Authorization", owner.bearer())
        .json(&json!({ "role": "core" }))
        .await;

    let notifications: Vec<Value> = client
        .get(&api_path("/notifications"))
        .add_header("Authorization", bob.bearer())
        .await
        .json();
    assert_eq!(notifications.len(), 2);
    assert!(notifications.iter().any(|n| n["type"] == "invite"));
    assert!(notifications.iter().any(|n| n["type"] == "role"));
    assert!(notifications
        .iter()
        .all(|n| n["repo_id"] == workspace_id.to_string() && n["is_read"] == false));

    let count: Value = client
        .get(&api_path("/notifications/unread-count"))
        .add_header("Authorization", bob.bearer())
        .await
        .json();
    assert_eq!(count["count"], 2);
}

#[tokio::test]
async fn test_mark_read_and_mark_all_read() {
    let app = setup_test_app().await;
    let client = app.client();
    let owner = register_test_user(client, "alice").await;
    let bob = register_test_user(client, "bob").await;
    let workspace_id = id_of(&create_workspace(client, &owner, "acme/widgets").await);
    let second_id = id_of(&create_workspace(client, &owner, "acme/gadgets").await);
    add_member(client, &owner, workspace_id, &bob, "viewer").await;
    add_member(client, &owner, second_id, &bob, "viewer").await;

    let notifications: Vec<Value> = client
        .get(&api_path("/notifications"))
        .add_header("Authorization", bob.bearer())
        .await
        .json();
    assert_eq!(notifications.len(), 2);
    let first = id_of(&notifications[0]);

    // someone else's notification looks missing
    let response = client
        .patch(&api_path(&format!("/notifications/{}/read", first)))
        .add_header("Authorization", owner.bearer())
        .await;
    assert_eq!(response.status_code(), 404);

    let response = client
        .patch(&api_path(&format!("/notifications/{}/read", first)))
        .add_header("Authorization", bob.bearer())
        .await;
    assert_eq!(response.status_code(), 200);
    let notification: Value = response.json();
    assert_eq!(notification["is_read"], true);

    let unread: Vec<Value> = client
        .get(&api_path("/notifications?unread=true"))
        .add_header("Authorization", bob.bearer())
        .await
        .json();
    assert_eq!(unread.len(), 1);

    let response = client
        .post(&api_path("/notifications/read-all"))
        .add_header("Authorization", bob.bearer())
        .await;
    assert_eq!(response.status_code(), 200);
    let marked: Value = response.json();
    assert_eq!(marked["updated"], 1);

    let count: Value = client
        .get(&api_path("/notifications/unread-count"))
        .add_header("Authorization", bob.bearer())
        .await
        .json();
    assert_eq!(count["count"], 0);
}
