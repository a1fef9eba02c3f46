//! Channel API integration tests: visibility, participation and the deletion cascade.

mod helpers;

use helpers::auth::register_test_user;
use helpers::workflows::{
    add_member, create_channel, create_workspace, general_channel_id, id_of, send_message,
};
use helpers::{api_path, setup_test_app};
use serde_json::{json, Value};
use tandem_services::Room;

#[tokio::test]
async fn test_viewer_and_private_channel_access() {
    let app = setup_test_app().await;
    let client = app.client();
    let owner = register_test_user(client, "alice").await;
    let viewer = register_test_user(client, "victor").await;
    let workspace_id = id_of(&create_workspace(client, &owner, "acme/widgets").await);
    add_member(client, &owner, workspace_id, &viewer, "viewer").await;

    // viewers cannot create channels
    let response = client
        .post(&api_path(&format!("/workspaces/{}/channels", workspace_id)))
        .add_header("Authorization", viewer.bearer())
        .json(&json!({ "name": "random" }))
        .await;
    assert_eq!(response.status_code(), 403);

    let secret = id_of(&create_channel(client, &owner, workspace_id, "Secret", true).await);

    // invisible and unreadable until added
    let channels: Vec<Value> = client
        .get(&api_path(&format!("/workspaces/{}/channels", workspace_id)))
        .add_header("Authorization", viewer.bearer())
        .await
        .json();
    assert!(channels.iter().all(|c| c["name"] != "secret"));

    let response = client
        .get(&api_path(&format!("/channels/{}/messages", secret)))
        .add_header("Authorization", viewer.bearer())
        .await;
    assert_eq!(response.status_code(), 403);

    let response = client
        .post(&api_path(&format!("/channels/{}/join", secret)))
        .add_header("Authorization", viewer.bearer())
        .await;
    assert_eq!(response.status_code(), 403);

    let response = client
        .post(&api_path(&format!("/channels/{}/participants", secret)))
        .add_header("Authorization", owner.bearer())
        .json(&json!({ "user_id": viewer.user_id }))
        .await;
    assert_eq!(response.status_code(), 200);
    let channel: Value = response.json();
    assert!(channel["participants"]
        .as_array()
        .unwrap()
        .contains(&json!(viewer.user_id.to_string())));

    let response = client
        .get(&api_path(&format!("/channels/{}/messages", secret)))
        .add_header("Authorization", viewer.bearer())
        .await;
    assert_eq!(response.status_code(), 200);

    send_message(client, &viewer, secret, "hello from the inside").await;

    let messages: Vec<Value> = client
        .get(&api_path(&format!("/channels/{}/messages", secret)))
        .add_header("Authorization", owner.bearer())
        .await
        .json();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["sender_id"], viewer.user_id.to_string());
}

#[tokio::test]
async fn test_channel_names_are_normalized_and_unique() {
    let app = setup_test_app().await;
    let client = app.client();
    let owner = register_test_user(client, "alice").await;
    let workspace_id = id_of(&create_workspace(client, &owner, "acme/widgets").await);

    let channel = create_channel(client, &owner, workspace_id, "  Backend ", false).await;
    assert_eq!(channel["name"], "backend");

    let response = client
        .post(&api_path(&format!("/workspaces/{}/channels", workspace_id)))
        .add_header("Authorization", owner.bearer())
        .json(&json!({ "name": "BACKEND" }))
        .await;
    assert_eq!(response.status_code(), 409);

    let response = client
        .post(&api_path(&format!("/workspaces/{}/channels", workspace_id)))
        .add_header("Authorization", owner.bearer())
        .json(&json!({ "name": "   " }))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_general_channel_is_protected() {
    let app = setup_test_app().await;
    let client = app.client();
    let owner = register_test_user(client, "alice").await;
    let general = general_channel_id(&create_workspace(client, &owner, "acme/widgets").await);

    let response = client
        .delete(&api_path(&format!("/channels/{}", general)))
        .add_header("Authorization", owner.bearer())
        .await;
    assert_eq!(response.status_code(), 409);

    let response = client
        .patch(&api_path(&format!("/channels/{}", general)))
        .add_header("Authorization", owner.bearer())
        .json(&json!({ "is_private": true }))
        .await;
    assert_eq!(response.status_code(), 409);

    let response = client
        .post(&api_path(&format!("/channels/{}/leave", general)))
        .add_header("Authorization", owner.bearer())
        .await;
    assert_eq!(response.status_code(), 409);
}

#[tokio::test]
async fn test_join_and_leave_public_channel() {
    let app = setup_test_app().await;
    let client = app.client();
    let owner = register_test_user(client, "alice").await;
    let bob = register_test_user(client, "bob").await;
    let workspace_id = id_of(&create_workspace(client, &owner, "acme/widgets").await);
    add_member(client, &owner, workspace_id, &bob, "contributor").await;
    let channel_id = id_of(&create_channel(client, &owner, workspace_id, "random", false).await);

    let response = client
        .post(&api_path(&format!("/channels/{}/join", channel_id)))
        .add_header("Authorization", bob.bearer())
        .await;
    assert_eq!(response.status_code(), 200);
    let channel: Value = response.json();
    assert!(channel["participants"]
        .as_array()
        .unwrap()
        .contains(&json!(bob.user_id.to_string())));

    let response = client
        .post(&api_path(&format!("/channels/{}/leave", channel_id)))
        .add_header("Authorization", bob.bearer())
        .await;
    assert_eq!(response.status_code(), 200);
    let channel: Value = response.json();
    assert!(!channel["participants"]
        .as_array()
        .unwrap()
        .contains(&json!(bob.user_id.to_string())));
}

#[tokio::test]
async fn test_add_participant_requires_workspace_member() {
    let app = setup_test_app().await;
    let client = app.client();
    let owner = register_test_user(client, "alice").await;
    let stranger = register_test_user(client, "mallory").await;
    let workspace_id = id_of(&create_workspace(client, &owner, "acme/widgets").await);
    let secret = id_of(&create_channel(client, &owner, workspace_id, "secret", true).await);

    let response = client
        .post(&api_path(&format!("/channels/{}/participants", secret)))
        .add_header("Authorization", owner.bearer())
        .json(&json!({ "user_id": stranger.user_id }))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_remove_participant_revokes_read_access() {
    let app = setup_test_app().await;
    let client = app.client();
    let owner = register_test_user(client, "alice").await;
    let bob = register_test_user(client, "bob").await;
    let workspace_id = id_of(&create_workspace(client, &owner, "acme/widgets").await);
    add_member(client, &owner, workspace_id, &bob, "contributor").await;
    let secret = id_of(&create_channel(client, &owner, workspace_id, "secret", true).await);

    client
        .post(&api_path(&format!("/channels/{}/participants", secret)))
        .add_header("Authorization", owner.bearer())
        .json(&json!({ "user_id": bob.user_id }))
        .await;
    let response = client
        .delete(&api_path(&format!("/channels/{}/participants/{}", secret, bob.user_id)))
        .add_header("Authorization", owner.bearer())
        .await;
    assert_eq!(response.status_code(), 200);

    let response = client
        .get(&api_path(&format!("/channels/{}/messages", secret)))
        .add_header("Authorization", bob.bearer())
        .await;
    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn test_delete_channel_removes_its_messages() {
    let app = setup_test_app().await;
    let client = app.client();
    let owner = register_test_user(client, "alice").await;
    let workspace_id = id_of(&create_workspace(client, &owner, "acme/widgets").await);
    let channel_id = id_of(&create_channel(client, &owner, workspace_id, "doomed", false).await);
    let message = send_message(client, &owner, channel_id, "soon gone").await;

    let response = client
        .delete(&api_path(&format!("/channels/{}", channel_id)))
        .add_header("Authorization", owner.bearer())
        .await;
    assert_eq!(response.status_code(), 204);

    let response = client
        .get(&api_path(&format!("/messages/{}", id_of(&message))))
        .add_header("Authorization", owner.bearer())
        .await;
    assert_eq!(response.status_code(), 404);

    let response = client
        .get(&api_path(&format!("/channels/{}/messages", channel_id)))
        .add_header("Authorization", owner.bearer())
        .await;
    assert_eq!(response.status_code(), 404);

    let detail: Value = client
        .get(&api_path(&format!("/workspaces/{}", workspace_id)))
        .add_header("Authorization", owner.bearer())
        .await
        .json();
    assert!(detail["channels"]
        .as_array()
        .unwrap()
        .iter()
        .all(|c| c["name"] != "doomed"));
}

#[tokio::test]
async fn test_non_participant_cannot_leave_private_channel() {
    let app = setup_test_app().await;
    let client = app.client();
    let owner = register_test_user(client, "alice").await;
    let viewer = register_test_user(client, "victor").await;
    let workspace_id = id_of(&create_workspace(client, &owner, "acme/widgets").await);
    add_member(client, &owner, workspace_id, &viewer, "viewer").await;
    let secret = id_of(&create_channel(client, &owner, workspace_id, "secret", true).await);

    let response = client
        .post(&api_path(&format!("/channels/{}/leave", secret)))
        .add_header("Authorization", viewer.bearer())
        .await;
    assert_eq!(response.status_code(), 403);
    let body: Value = response.json();
    assert!(body.get("participants").is_none());
    assert!(body.get("name").is_none());
}

#[tokio::test]
async fn test_core_member_cannot_add_self_to_private_channel() {
    let app = setup_test_app().await;
    let client = app.client();
    let owner = register_test_user(client, "alice").await;
    let core = register_test_user(client, "carol").await;
    let workspace_id = id_of(&create_workspace(client, &owner, "acme/widgets").await);
    add_member(client, &owner, workspace_id, &core, "core").await;
    let secret = id_of(&create_channel(client, &owner, workspace_id, "secret", true).await);
    send_message(client, &owner, secret, "private plan").await;

    let response = client
        .post(&api_path(&format!("/channels/{}/participants", secret)))
        .add_header("Authorization", core.bearer())
        .json(&json!({ "user_id": core.user_id }))
        .await;
    assert_eq!(response.status_code(), 403);

    let response = client
        .delete(&api_path(&format!("/channels/{}/participants/{}", secret, owner.user_id)))
        .add_header("Authorization", core.bearer())
        .await;
    assert_eq!(response.status_code(), 403);

    let response = client
        .get(&api_path(&format!("/channels/{}/messages", secret)))
        .add_header("Authorization", core.bearer())
        .await;
    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn test_leaving_unjoined_public_channel_is_a_no_op() {
    let app = setup_test_app().await;
    let client = app.client();
    let owner = register_test_user(client, "alice").await;
    let bob = register_test_user(client, "bob").await;
    let workspace_id = id_of(&create_workspace(client, &owner, "acme/widgets").await);
    add_member(client, &owner, workspace_id, &bob, "contributor").await;
    let channel_id = id_of(&create_channel(client, &owner, workspace_id, "random", false).await);

    let mut listener = app.state.connections.register(owner.user_id).await.unwrap();
    app.state
        .connections
        .join(listener.connection_id, Room::Workspace(workspace_id))
        .await;

    let response = client
        .post(&api_path(&format!("/channels/{}/leave", channel_id)))
        .add_header("Authorization", bob.bearer())
        .await;
    assert_eq!(response.status_code(), 200);
    assert!(listener.receiver.try_recv().is_err());
}
