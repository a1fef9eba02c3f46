//! Application state and sub-state extractors.
//!
//! Everything request handlers share lives in one [`AppState`] behind an `Arc`. The
//! authentication middleware only needs the token verifier and the user store, so that
//! slice is exposed separately through `FromRef`.

use crate::auth::JwtService;
use std::sync::Arc;
use tandem_core::{CacheKey, Config};
use tandem_db::Store;
use tandem_infra::CacheAside;
use tandem_services::{
    Broadcaster, ConnectionManager, MentionService, NotificationService, RepositoryEventService,
    RepositoryHost,
};
use uuid::Uuid;

/// Token verification and user mirroring.
#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<JwtService>,
    pub store: Store,
}

pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub cache: CacheAside,
    pub connections: ConnectionManager,
    pub broadcaster: Broadcaster,
    pub notifications: NotificationService,
    pub mentions: MentionService,
    pub repo_host: Arc<dyn RepositoryHost>,
    pub repository_events: RepositoryEventService,
    pub auth: AuthState,
}

impl AppState {
    /// Wire the services over an already-built store, cache and repository host.
    pub fn new(
        config: Config,
        store: Store,
        cache: CacheAside,
        repo_host: Arc<dyn RepositoryHost>,
    ) -> Self {
        let connections = ConnectionManager::new(config.ws_outbound_buffer);
        let broadcaster = Broadcaster::new(connections.clone());
        let notifications =
            NotificationService::new(store.notifications.clone(), connections.clone());
        let mentions = MentionService::new(store.clone(), notifications.clone());
        let repository_events =
            RepositoryEventService::new(store.clone(), notifications.clone(), cache.clone());
        let auth = AuthState {
            jwt: Arc::new(JwtService::new(&config.jwt_secret, config.jwt_issuer.clone())),
            store: store.clone(),
        };

        Self {
            config,
            store,
            cache,
            connections,
            broadcaster,
            notifications,
            mentions,
            repo_host,
            repository_events,
            auth,
        }
    }

    /// Drop the cached views a mutation on `workspace_id` made stale.
    pub async fn invalidate<I>(&self, workspace_id: Uuid, requester: Uuid, affected: I)
    where
        I: IntoIterator<Item = Uuid>,
    {
        let keys = CacheKey::invalidation_set(workspace_id, requester, affected);
        self.cache.invalidate(&keys).await;
    }
}

impl axum::extract::FromRef<Arc<AppState>> for AuthState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.auth.clone()
    }
}
