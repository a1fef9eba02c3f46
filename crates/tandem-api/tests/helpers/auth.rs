use axum_test::TestServer;
use chrono::{Duration, Utc};
use tandem_api::auth::{Claims, JwtService};
use uuid::Uuid;

use super::{api_path, TEST_JWT_SECRET};

/// Authenticated test user
#[derive(Debug, Clone)]
pub struct TestUser {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

impl TestUser {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Mint a token for `user_id` without touching the server.
pub fn mint_token(user_id: Uuid, username: &str) -> String {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        name: Some(format!("{} (test)", username)),
        picture: None,
        iss: None,
        exp: (now + Duration::hours(1)).timestamp(),
        iat: now.timestamp(),
    };
    JwtService::new(TEST_JWT_SECRET, None)
        .issue(&claims)
        .expect("Failed to sign test token")
}

/// Mint a token and hit `/me` once so the user exists in the store (invites look users
/// up by username).
pub async fn register_test_user(client: &TestServer, username: &str) -> TestUser {
    let user_id = Uuid::new_v4();
    let user = TestUser {
        user_id,
        username: username.to_string(),
        token: mint_token(user_id, username),
    };

    let response = client
        .get(&api_path("/me"))
        .add_header("Authorization", user.bearer())
        .await;
    assert_eq!(response.status_code(), 200, "register {}", username);

    user
}
