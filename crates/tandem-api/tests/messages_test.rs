//! Message and reaction API integration tests.

mod helpers;

use helpers::auth::register_test_user;
use helpers::workflows::{add_member, create_workspace, general_channel_id, id_of, send_message};
use helpers::{api_path, setup_test_app};
use serde_json::{json, Value};

#[tokio::test]
async fn test_message_pages_are_newest_windows_in_chronological_order() {
    let app = setup_test_app().await;
    let client = app.client();
    let owner = register_test_user(client, "alice").await;
    let general = general_channel_id(&create_workspace(client, &owner, "acme/widgets").await);

    for i in 0..5 {
        send_message(client, &owner, general, &format!("message {}", i)).await;
    }

    let page: Vec<Value> = client
        .get(&api_path(&format!("/channels/{}/messages?limit=2&offset=1", general)))
        .add_header("Authorization", owner.bearer())
        .await
        .json();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0]["content"], "message 2");
    assert_eq!(page[1]["content"], "message 3");
}

#[tokio::test]
async fn test_blank_message_is_rejected() {
    let app = setup_test_app().await;
    let client = app.client();
    let owner = register_test_user(client, "alice").await;
    let general = general_channel_id(&create_workspace(client, &owner, "acme/widgets").await);

    let response = client
        .post(&api_path(&format!("/channels/{}/messages", general)))
        .add_header("Authorization", owner.bearer())
        .json(&json!({ "content": "   " }))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_reaction_toggle_adds_then_removes() {
    let app = setup_test_app().await;
    let client = app.client();
    let owner = register_test_user(client, "alice").await;
    let bob = register_test_user(client, "bob").await;
    let workspace = create_workspace(client, &owner, "acme/widgets").await;
    add_member(client, &owner, id_of(&workspace), &bob, "viewer").await;
    let message = send_message(client, &owner, general_channel_id(&workspace), "ship it").await;
    let path = api_path(&format!("/messages/{}/reactions", id_of(&message)));

    for user in [&owner, &bob] {
        let response = client
            .put(&path)
            .add_header("Authorization", user.bearer())
            .json(&json!({ "emoji": "🚀" }))
            .await;
        assert_eq!(response.status_code(), 200);
    }

    let message: Value = client
        .get(&api_path(&format!("/messages/{}", id_of(&message))))
        .add_header("Authorization", bob.bearer())
        .await
        .json();
    assert_eq!(message["reactions"][0]["emoji"], "🚀");
    assert_eq!(message["reactions"][0]["count"], 2);

    let response = client
        .put(&path)
        .add_header("Authorization", bob.bearer())
        .json(&json!({ "emoji": "🚀" }))
        .await;
    let message: Value = response.json();
    assert_eq!(message["reactions"][0]["count"], 1);
    assert_eq!(
        message["reactions"][0]["user_ids"],
        json!([owner.user_id.to_string()])
    );
}

#[tokio::test]
async fn test_only_sender_can_delete_message() {
    let app = setup_test_app().await;
    let client = app.client();
    let owner = register_test_user(client, "alice").await;
    let bob = register_test_user(client, "bob").await;
    let workspace = create_workspace(client, &owner, "acme/widgets").await;
    add_member(client, &owner, id_of(&workspace), &bob, "core").await;
    let message = send_message(client, &bob, general_channel_id(&workspace), "mine").await;
    let path = api_path(&format!("/messages/{}", id_of(&message)));

    let response = client
        .delete(&path)
        .add_header("Authorization", owner.bearer())
        .await;
    assert_eq!(response.status_code(), 403);

    let response = client
        .delete(&path)
        .add_header("Authorization", bob.bearer())
        .await;
    assert_eq!(response.status_code(), 204);

    let response = client
        .get(&path)
        .add_header("Authorization", bob.bearer())
        .await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_mentions_notify_members_but_not_sender() {
    let app = setup_test_app().await;
    let client = app.client();
    let owner = register_test_user(client, "alice").await;
    let bob = register_test_user(client, "bob").await;
    let workspace = create_workspace(client, &owner, "acme/widgets").await;
    add_member(client, &owner, id_of(&workspace), &bob, "viewer").await;

    send_message(
        client,
        &owner,
        general_channel_id(&workspace),
        "@bob @alice @nobody please review",
    )
    .await;

    let notifications: Vec<Value> = client
        .get(&api_path("/notifications"))
        .add_header("Authorization", bob.bearer())
        .await
        .json();
    assert!(notifications
        .iter()
        .any(|n| n["type"] == "mention" && n["target_type"] == "message"));

    let notifications: Vec<Value> = client
        .get(&api_path("/notifications"))
        .add_header("Authorization", owner.bearer())
        .await
        .json();
    assert!(notifications.iter().all(|n| n["type"] != "mention"));
}

#[tokio::test]
async fn test_repeated_mentions_notify_each_user_once() {
    let app = setup_test_app().await;
    let client = app.client();
    let owner = register_test_user(client, "alice").await;
    let bob = register_test_user(client, "bob").await;
    let carol = register_test_user(client, "carol").await;
    let workspace = create_workspace(client, &owner, "acme/widgets").await;
    add_member(client, &owner, id_of(&workspace), &bob, "viewer").await;
    add_member(client, &owner, id_of(&workspace), &carol, "contributor").await;

    send_message(
        client,
        &carol,
        general_channel_id(&workspace),
        "@alice @alice @bob @Carol sync?",
    )
    .await;

    for (user, expected) in [(&owner, 1), (&bob, 1), (&carol, 0)] {
        let notifications: Vec<Value> = client
            .get(&api_path("/notifications"))
            .add_header("Authorization", user.bearer())
            .await
            .json();
        let mentions = notifications
            .iter()
            .filter(|n| n["type"] == "mention")
            .count();
        assert_eq!(mentions, expected, "mentions for {}", user.username);
    }
}
