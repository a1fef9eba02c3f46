use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use tandem_core::models::{NewNotification, Notification};
use tandem_core::AppError;
use uuid::Uuid;

use crate::db::store::NotificationStore;

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, message, type, repo_id, target_type, target_id, is_read, created_at";

/// Repository for per-user notifications
#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for NotificationRepository {
    #[tracing::instrument(skip(self, new), fields(db.table = "notifications", db.operation = "insert", user_id = %new.user_id))]
    async fn create_notification(&self, new: NewNotification) -> Result<Notification, AppError> {
        let notification = sqlx::query_as::<Postgres, Notification>(&format!(
            r#"
            INSERT INTO notifications (id, user_id, message, type, repo_id, target_type, target_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.message)
        .bind(new.notification_type)
        .bind(new.repo_id)
        .bind(new.target_type)
        .bind(new.target_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(notification)
    }

    #[tracing::instrument(skip(self), fields(db.table = "notifications", db.operation = "select"))]
    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, AppError> {
        let notifications = sqlx::query_as::<Postgres, Notification>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS} FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR is_read = FALSE)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    #[tracing::instrument(skip(self), fields(db.table = "notifications", db.operation = "update", db.record_id = %id))]
    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<Option<Notification>, AppError> {
        let notification = sqlx::query_as::<Postgres, Notification>(&format!(
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2 RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(notification)
    }

    #[tracing::instrument(skip(self), fields(db.table = "notifications", db.operation = "update"))]
    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self), fields(db.table = "notifications", db.operation = "count"))]
    async fn unread_count(&self, user_id: Uuid) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<Postgres, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
