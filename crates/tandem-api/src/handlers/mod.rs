pub mod activity;
pub mod channels;
pub mod health;
pub mod members;
pub mod messages;
pub mod notifications;
pub mod realtime;
pub mod users;
pub mod webhooks;
pub mod workspaces;

use crate::state::AppState;
use tandem_core::models::{ActivityKind, NewActivity};
use uuid::Uuid;

/// Append to the workspace activity log. The log is informational, so a failed write is
/// logged and never fails the request that triggered it.
pub(crate) async fn record_activity(
    state: &AppState,
    workspace_id: Uuid,
    actor_id: Uuid,
    kind: ActivityKind,
    detail: serde_json::Value,
) {
    let entry = NewActivity {
        workspace_id,
        actor_id: Some(actor_id),
        kind,
        detail,
    };
    if let Err(e) = state.store.activity.record_activity(entry).await {
        tracing::warn!(error = %e, workspace_id = %workspace_id, "Failed to record activity");
    }
}
