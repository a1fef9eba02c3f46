//! Test helpers: build AppState and router for integration tests.
//!
//! Everything runs in-process against the memory store and the LRU cache, so no
//! external services are needed: `cargo test -p tandem-api`.

#![allow(dead_code)]

pub mod auth;
pub mod workflows;

use axum_test::TestServer;
use std::sync::Arc;
use tandem_api::setup::routes;
use tandem_api::AppState;
use tandem_core::constants::API_PREFIX;
use tandem_core::Config;
use tandem_db::Store;
use tandem_infra::create_cache_backend;
use tandem_services::NoopRepositoryHost;

/// Secret shared by the app under test and the token minting helpers
pub const TEST_JWT_SECRET: &str = "test-jwt-secret-at-least-32-characters-long";

/// Secret used to sign webhook bodies when ingestion is enabled
pub const TEST_WEBHOOK_SECRET: &str = "test-webhook-secret";

/// API path prefix for tests (e.g. `/api/v1`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", API_PREFIX, path)
}

/// Test application: server plus the shared state for inspecting side effects.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

/// Local configuration with the test JWT secret
pub fn test_config() -> Config {
    Config::local(TEST_JWT_SECRET)
}

/// Setup test app with default local configuration.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(test_config()).await
}

/// Setup test app with webhook ingestion enabled.
pub async fn setup_test_app_with_webhooks() -> TestApp {
    let mut config = test_config();
    config.webhook_secret = Some(TEST_WEBHOOK_SECRET.to_string());
    setup_test_app_with(config).await
}

pub async fn setup_test_app_with(config: Config) -> TestApp {
    let cache = create_cache_backend(&config).expect("Failed to create cache");
    let state = Arc::new(AppState::new(
        config.clone(),
        Store::in_memory(),
        cache,
        Arc::new(NoopRepositoryHost),
    ));

    let app = routes::setup_routes(&config, state.clone()).expect("Failed to setup routes");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp { server, state }
}
