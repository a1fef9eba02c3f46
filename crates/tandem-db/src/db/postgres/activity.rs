use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use tandem_core::models::{ActivityEvent, NewActivity};
use tandem_core::AppError;
use uuid::Uuid;

use crate::db::store::ActivityStore;

/// Repository for the append-only workspace activity log
#[derive(Clone)]
pub struct ActivityRepository {
    pool: PgPool,
}

impl ActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityStore for ActivityRepository {
    #[tracing::instrument(skip(self, new), fields(db.table = "activity_events", db.operation = "insert", workspace_id = %new.workspace_id))]
    async fn record_activity(&self, new: NewActivity) -> Result<ActivityEvent, AppError> {
        let event = sqlx::query_as::<Postgres, ActivityEvent>(
            r#"
            INSERT INTO activity_events (id, workspace_id, actor_id, kind, detail)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, workspace_id, actor_id, kind, detail, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.workspace_id)
        .bind(new.actor_id)
        .bind(new.kind)
        .bind(new.detail)
        .fetch_one(&self.pool)
        .await?;

        Ok(event)
    }

    #[tracing::instrument(skip(self), fields(db.table = "activity_events", db.operation = "select"))]
    async fn list_activity(
        &self,
        workspace_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ActivityEvent>, AppError> {
        let events = sqlx::query_as::<Postgres, ActivityEvent>(
            r#"
            SELECT id, workspace_id, actor_id, kind, detail, created_at
            FROM activity_events
            WHERE workspace_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(workspace_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}
