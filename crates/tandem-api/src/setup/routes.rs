//! Route configuration and setup

use crate::auth::{auth_middleware, ws_auth_middleware};
use crate::handlers::{
    activity, channels, health, members, messages, notifications, realtime, users, webhooks,
    workspaces,
};
use crate::middleware::{guarded, Scope};
use crate::state::AppState;
use axum::{
    http::{HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use std::sync::Arc;
use tandem_core::constants::API_PREFIX;
use tandem_core::{Config, Permission};
use tandem_infra::{request_id_middleware, security_headers_middleware};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// JSON bodies are small; attachments are links, not uploads
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let protected_routes = protected_routes(&state).layer(from_fn_with_state(
        state.auth.clone(),
        auth_middleware,
    ));

    // Server-level concurrency limit to protect against resource exhaustion under extreme load
    let http_concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(10_000)
        .max(1);
    tracing::info!(
        http_concurrency_limit = http_concurrency_limit,
        "HTTP concurrency limit layer enabled"
    );

    let app = public_routes(&state)
        .nest(API_PREFIX, protected_routes)
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .with_state(state);

    Ok(app)
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];

    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}

/// Public routes (no bearer authentication; `/ws` and the webhook authenticate themselves)
fn public_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/live", get(health::liveness_check))
        .route(
            "/api/openapi.json",
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
        .route(
            "/webhooks/repository",
            post(webhooks::receive_repository_event),
        )
        .route(
            "/ws",
            get(realtime::ws_handler).route_layer(from_fn_with_state(
                state.auth.clone(),
                ws_auth_middleware,
            )),
        )
}

/// Protected routes, mounted under the API prefix. Resource routes carry their own
/// permission guard; the rest only need an authenticated caller.
fn protected_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    use Permission::{ManageMembers, ManageSettings, Read};

    let workspace = Scope::Workspace;
    let channel = Scope::Channel {
        require_participation: false,
    };
    let readable_channel = Scope::Channel {
        require_participation: true,
    };
    let readable_message = Scope::Message {
        require_participation: true,
    };
    let own_message = Scope::Message {
        require_participation: false,
    };

    Router::new()
        .route("/me", get(users::get_me))
        // Workspaces
        .route(
            "/workspaces",
            get(workspaces::list_active_workspaces).post(workspaces::create_workspace),
        )
        .route("/workspaces/discover", get(workspaces::discover_workspaces))
        .route(
            "/workspaces/{id}",
            guarded(state, workspace, Read, get(workspaces::get_workspace)).merge(guarded(
                state,
                workspace,
                ManageSettings,
                patch(workspaces::update_workspace).delete(workspaces::delete_workspace),
            )),
        )
        .route(
            "/workspaces/{id}/activity",
            guarded(state, workspace, Read, get(activity::list_activity)),
        )
        // Members
        .route(
            "/workspaces/{id}/members",
            guarded(state, workspace, Read, get(members::list_members)).merge(guarded(
                state,
                workspace,
                ManageMembers,
                post(members::add_member),
            )),
        )
        .route(
            "/workspaces/{id}/members/{user_id}",
            guarded(
                state,
                workspace,
                ManageMembers,
                patch(members::update_member_role).delete(members::remove_member),
            ),
        )
        .route(
            "/workspaces/{id}/leave",
            guarded(state, workspace, Read, post(members::leave_workspace)),
        )
        // Channels
        .route(
            "/workspaces/{id}/channels",
            guarded(state, workspace, Read, get(channels::list_channels)).merge(guarded(
                state,
                workspace,
                ManageMembers,
                post(channels::create_channel),
            )),
        )
        .route(
            "/channels/{id}",
            guarded(
                state,
                channel,
                ManageSettings,
                patch(channels::update_channel).delete(channels::delete_channel),
            ),
        )
        .route(
            "/channels/{id}/join",
            guarded(state, channel, Read, post(channels::join_channel)),
        )
        .route(
            "/channels/{id}/leave",
            guarded(state, readable_channel, Read, post(channels::leave_channel)),
        )
        .route(
            "/channels/{id}/participants",
            guarded(
                state,
                readable_channel,
                ManageMembers,
                post(channels::add_participant),
            ),
        )
        .route(
            "/channels/{id}/participants/{user_id}",
            guarded(
                state,
                readable_channel,
                ManageMembers,
                delete(channels::remove_participant),
            ),
        )
        // Messages
        .route(
            "/channels/{id}/messages",
            guarded(
                state,
                readable_channel,
                Read,
                get(messages::list_messages).post(messages::send_message),
            ),
        )
        .route(
            "/messages/{id}",
            guarded(state, readable_message, Read, get(messages::get_message)).merge(guarded(
                state,
                own_message,
                Read,
                delete(messages::delete_message),
            )),
        )
        .route(
            "/messages/{id}/reactions",
            guarded(
                state,
                readable_message,
                Read,
                put(messages::toggle_reaction),
            ),
        )
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route(
            "/notifications/unread-count",
            get(notifications::unread_count),
        )
        .route(
            "/notifications/read-all",
            post(notifications::mark_all_read),
        )
        .route("/notifications/{id}/read", patch(notifications::mark_read))
}
