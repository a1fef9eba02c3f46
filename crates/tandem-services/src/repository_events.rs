//! Repository webhook ingestion
//!
//! The repository host posts events signed with HMAC-SHA256 (`X-Hub-Signature-256:
//! sha256=<hex>`). Only `repository.id` / `repository.full_name` and the event name are
//! read; the matching workspace gets an activity entry, owner/core members get an `alert`
//! notification, and its `detail` cache key is invalidated.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tandem_core::models::{
    ActivityKind, NewActivity, NewNotification, NotificationTarget, NotificationType, Workspace,
    WorkspaceRole,
};
use tandem_core::{AppError, CacheKey};
use tandem_db::Store;
use tandem_infra::CacheAside;
use uuid::Uuid;

use crate::notification::NotificationService;
use crate::repo_host::GITHUB_PROVIDER;

type HmacSha256 = Hmac<Sha256>;

/// Check `signature` (`sha256=<hex>`) against the HMAC of `body`
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Some(hex_digest) = signature.trim().strip_prefix("sha256=") else {
        return false;
    };
    let Ok(provided) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let expected = mac.finalize().into_bytes();

    expected.as_slice().ct_eq(provided.as_slice()).into()
}

#[derive(Debug, Deserialize)]
struct EventPayload {
    repository: Option<RepositoryRef>,
}

#[derive(Debug, Deserialize)]
struct RepositoryRef {
    id: Option<serde_json::Value>,
    full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryEventOutcome {
    /// No workspace mirrors the repository
    Ignored,
    Recorded { workspace_id: Uuid, notified: usize },
}

#[derive(Clone)]
pub struct RepositoryEventService {
    store: Store,
    notifications: NotificationService,
    cache: CacheAside,
}

impl RepositoryEventService {
    pub fn new(store: Store, notifications: NotificationService, cache: CacheAside) -> Self {
        Self {
            store,
            notifications,
            cache,
        }
    }

    async fn find_workspace(&self, repo: &RepositoryRef) -> Result<Option<Workspace>, AppError> {
        // numeric ids from the API, lowercased full names for synthesized links
        let mut candidates = Vec::new();
        match &repo.id {
            Some(serde_json::Value::Number(n)) => candidates.push(n.to_string()),
            Some(serde_json::Value::String(s)) => candidates.push(s.clone()),
            _ => {}
        }
        if let Some(full_name) = &repo.full_name {
            candidates.push(full_name.to_lowercase());
        }

        for external_id in candidates {
            if let Some(workspace) = self
                .store
                .workspaces
                .find_by_repository(GITHUB_PROVIDER, &external_id)
                .await?
            {
                return Ok(Some(workspace));
            }
        }
        Ok(None)
    }

    #[tracing::instrument(skip(self, body), fields(event = %event))]
    pub async fn ingest(
        &self,
        event: &str,
        body: &[u8],
    ) -> Result<RepositoryEventOutcome, AppError> {
        let payload: EventPayload = serde_json::from_slice(body)
            .map_err(|e| AppError::InvalidInput(format!("Invalid webhook payload: {}", e)))?;
        let Some(repo) = payload.repository else {
            return Ok(RepositoryEventOutcome::Ignored);
        };
        let Some(workspace) = self.find_workspace(&repo).await? else {
            tracing::debug!("Webhook for unknown repository ignored");
            return Ok(RepositoryEventOutcome::Ignored);
        };

        self.store
            .activity
            .record_activity(NewActivity {
                workspace_id: workspace.id,
                actor_id: None,
                kind: ActivityKind::RepositoryEvent,
                detail: serde_json::json!({
                    "event": event,
                    "repository": workspace.repository.full_name,
                }),
            })
            .await?;

        let batch = workspace
            .members
            .iter()
            .filter(|m| matches!(m.role, WorkspaceRole::Owner | WorkspaceRole::Core))
            .map(|m| NewNotification {
                user_id: m.user_id,
                message: format!("{} event on {}", event, workspace.repository.full_name),
                notification_type: NotificationType::Alert,
                repo_id: workspace.id,
                target_type: NotificationTarget::Workspace,
                target_id: workspace.id,
            })
            .collect();
        let notified = self.notifications.notify_all(batch).await.len();

        self.cache.invalidate(&[CacheKey::detail(workspace.id)]).await;

        tracing::info!(workspace_id = %workspace.id, notified, "Repository event recorded");
        Ok(RepositoryEventOutcome::Recorded {
            workspace_id: workspace.id,
            notified,
        })
    }
}
