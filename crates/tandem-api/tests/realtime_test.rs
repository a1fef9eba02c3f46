//! Realtime delivery integration tests.
//!
//! Connections are registered directly on the app's connection manager, so the events
//! HTTP handlers emit can be read from the outbound queue without a socket.

mod helpers;

use helpers::auth::register_test_user;
use helpers::workflows::{
    add_member, create_channel, create_workspace, general_channel_id, id_of, send_message,
};
use helpers::{api_path, setup_test_app};
use serde_json::json;
use std::sync::Arc;
use tandem_services::{Registration, Room, ServerEvent};

fn drain(registration: &mut Registration) -> Vec<Arc<ServerEvent>> {
    let mut events = Vec::new();
    while let Ok(event) = registration.receiver.try_recv() {
        events.push(event);
    }
    events
}

fn names(events: &[Arc<ServerEvent>]) -> Vec<&'static str> {
    events.iter().map(|e| e.name()).collect()
}

#[tokio::test]
async fn test_ws_requires_token() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client.get("/ws").await;
    assert_eq!(response.status_code(), 401);

    let response = client.get("/ws?token=garbage").await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_channel_room_receives_messages_and_reactions() {
    let app = setup_test_app().await;
    let client = app.client();
    let owner = register_test_user(client, "alice").await;
    let workspace = create_workspace(client, &owner, "acme/widgets").await;
    let workspace_id = id_of(&workspace);
    let general = general_channel_id(&workspace);

    let mut listener = app.state.connections.register(owner.user_id).await.unwrap();
    app.state
        .connections
        .join(listener.connection_id, Room::channel(workspace_id, general))
        .await;

    let message = send_message(client, &owner, general, "hello room").await;
    client
        .put(&api_path(&format!("/messages/{}/reactions", id_of(&message))))
        .add_header("Authorization", owner.bearer())
        .json(&json!({ "emoji": "👍" }))
        .await;
    client
        .delete(&api_path(&format!("/messages/{}", id_of(&message))))
        .add_header("Authorization", owner.bearer())
        .await;

    let events = drain(&mut listener);
    assert_eq!(
        names(&events),
        vec!["message_received", "reaction_update", "message_deleted"]
    );
    match events[1].as_ref() {
        ServerEvent::ReactionUpdate(update) => {
            assert!(update.added);
            assert_eq!(update.emoji, "👍");
            assert_eq!(update.user_id, owner.user_id);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_private_channel_events_skip_workspace_room() {
    let app = setup_test_app().await;
    let client = app.client();
    let owner = register_test_user(client, "alice").await;
    let bob = register_test_user(client, "bob").await;
    let workspace_id = id_of(&create_workspace(client, &owner, "acme/widgets").await);
    add_member(client, &owner, workspace_id, &bob, "contributor").await;

    let mut bob_listener = app.state.connections.register(bob.user_id).await.unwrap();
    app.state
        .connections
        .join(bob_listener.connection_id, Room::Workspace(workspace_id))
        .await;

    create_channel(client, &owner, workspace_id, "public-news", false).await;
    create_channel(client, &owner, workspace_id, "secret", true).await;

    let events = drain(&mut bob_listener);
    assert_eq!(names(&events), vec!["new_channel"]);
    match events[0].as_ref() {
        ServerEvent::NewChannel(channel) => assert_eq!(channel.name, "public-news"),
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_notifications_are_pushed_to_user_room() {
    let app = setup_test_app().await;
    let client = app.client();
    let owner = register_test_user(client, "alice").await;
    let bob = register_test_user(client, "bob").await;
    let workspace_id = id_of(&create_workspace(client, &owner, "acme/widgets").await);

    // registration joins the user room on its own
    let mut bob_listener = app.state.connections.register(bob.user_id).await.unwrap();

    add_member(client, &owner, workspace_id, &bob, "viewer").await;

    let events = drain(&mut bob_listener);
    assert_eq!(names(&events), vec!["new_notification"]);
}

#[tokio::test]
async fn test_removed_member_is_evicted_from_rooms() {
    let app = setup_test_app().await;
    let client = app.client();
    let owner = register_test_user(client, "alice").await;
    let bob = register_test_user(client, "bob").await;
    let workspace = create_workspace(client, &owner, "acme/widgets").await;
    let workspace_id = id_of(&workspace);
    let general = general_channel_id(&workspace);
    add_member(client, &owner, workspace_id, &bob, "viewer").await;

    let bob_listener = app.state.connections.register(bob.user_id).await.unwrap();
    let connections = &app.state.connections;
    connections
        .join(bob_listener.connection_id, Room::Workspace(workspace_id))
        .await;
    connections
        .join(bob_listener.connection_id, Room::channel(workspace_id, general))
        .await;

    let response = client
        .delete(&api_path(&format!("/workspaces/{}/members/{}", workspace_id, bob.user_id)))
        .add_header("Authorization", owner.bearer())
        .await;
    assert_eq!(response.status_code(), 204);

    let rooms = connections.rooms_of(bob_listener.connection_id).await;
    assert_eq!(rooms, vec![Room::User(bob.user_id)]);
}

#[tokio::test]
async fn test_channel_made_private_disappears_for_outsiders() {
    let app = setup_test_app().await;
    let client = app.client();
    let owner = register_test_user(client, "alice").await;
    let bob = register_test_user(client, "bob").await;
    let workspace_id = id_of(&create_workspace(client, &owner, "acme/widgets").await);
    add_member(client, &owner, workspace_id, &bob, "contributor").await;
    let channel_id = id_of(&create_channel(client, &owner, workspace_id, "plans", false).await);

    let mut owner_listener = app.state.connections.register(owner.user_id).await.unwrap();
    let mut bob_listener = app.state.connections.register(bob.user_id).await.unwrap();
    for listener in [&owner_listener, &bob_listener] {
        app.state
            .connections
            .join(listener.connection_id, Room::Workspace(workspace_id))
            .await;
    }

    let response = client
        .patch(&api_path(&format!("/channels/{}", channel_id)))
        .add_header("Authorization", owner.bearer())
        .json(&json!({ "is_private": true }))
        .await;
    assert_eq!(response.status_code(), 200);

    assert_eq!(names(&drain(&mut owner_listener)), vec!["channel_updated"]);
    let events = drain(&mut bob_listener);
    assert_eq!(names(&events), vec!["channel_deleted"]);
    match events[0].as_ref() {
        ServerEvent::ChannelDeleted(channel) => assert_eq!(channel.id, channel_id),
        other => panic!("unexpected event {:?}", other),
    }
}
