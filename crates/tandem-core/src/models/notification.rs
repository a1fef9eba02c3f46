use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "notification_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Message,
    Mention,
    Alert,
    Invite,
    Role,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "notification_target", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum NotificationTarget {
    Workspace,
    Channel,
    Message,
}

/// Persisted notification. Only `is_read` ever changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    #[serde(rename = "type")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "type"))]
    pub notification_type: NotificationType,
    /// Workspace the notification belongs to
    pub repo_id: Uuid,
    pub target_type: NotificationTarget,
    pub target_id: Uuid,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub message: String,
    pub notification_type: NotificationType,
    pub repo_id: Uuid,
    pub target_type: NotificationTarget,
    pub target_id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct NotificationListQuery {
    /// Only unread notifications when true
    pub unread: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnreadCountResponse {
    pub count: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}
