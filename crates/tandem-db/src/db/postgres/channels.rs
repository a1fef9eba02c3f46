use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres};
use tandem_core::constants::GENERAL_CHANNEL;
use tandem_core::models::{normalize_channel_name, Channel, ChannelUpdate, NewChannel};
use tandem_core::AppError;
use uuid::Uuid;

use super::conflict_on_unique;
use crate::db::store::ChannelStore;
use crate::db::transaction::TransactionGuard;

/// Channel columns with the participant list aggregated; callers append WHERE/GROUP BY
pub(crate) const CHANNEL_SELECT: &str = r#"
    SELECT c.id, c.workspace_id, c.name, c.is_private,
        COALESCE(
            array_agg(p.user_id ORDER BY p.seq) FILTER (WHERE p.user_id IS NOT NULL),
            '{}'
        ) AS participants,
        c.created_by, c.created_at, c.updated_at
    FROM channels c
    LEFT JOIN channel_participants p ON p.channel_id = c.id
"#;

/// Repository for channels and their participants
#[derive(Clone)]
pub struct ChannelRepository {
    pool: PgPool,
}

impl ChannelRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load(conn: &mut PgConnection, id: Uuid) -> Result<Option<Channel>, AppError> {
        let channel = sqlx::query_as::<Postgres, Channel>(&format!(
            "{CHANNEL_SELECT} WHERE c.id = $1 GROUP BY c.id"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(channel)
    }

    /// Lock the channel row and return its name
    async fn lock(conn: &mut PgConnection, id: Uuid) -> Result<Option<String>, AppError> {
        let name = sqlx::query_scalar::<Postgres, String>(
            "SELECT name FROM channels WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(name)
    }
}

fn duplicate_name(name: &str) -> String {
    format!("Channel '{}' already exists in this workspace", name)
}

#[async_trait]
impl ChannelStore for ChannelRepository {
    #[tracing::instrument(skip(self, new), fields(db.table = "channels", db.operation = "insert", workspace_id = %new.workspace_id))]
    async fn create_channel(&self, new: NewChannel) -> Result<Channel, AppError> {
        let name = normalize_channel_name(&new.name);
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        let id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO channels (id, workspace_id, name, is_private, created_by) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(new.workspace_id)
        .bind(&name)
        .bind(new.is_private)
        .bind(new.created_by)
        .execute(&mut **tx)
        .await
        .map_err(|e| conflict_on_unique(e, duplicate_name(&name)))?;

        let mut participants = vec![new.created_by];
        for user in new.participants {
            if !participants.contains(&user) {
                participants.push(user);
            }
        }
        for user in participants {
            sqlx::query(
                "INSERT INTO channel_participants (channel_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(id)
            .bind(user)
            .execute(&mut **tx)
            .await?;
        }

        let channel = Self::load(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::Internal("Channel vanished after insert".to_string()))?;
        tx.commit().await?;
        Ok(channel)
    }

    #[tracing::instrument(skip(self), fields(db.table = "channels", db.operation = "select", db.record_id = %id))]
    async fn get_channel(&self, id: Uuid) -> Result<Option<Channel>, AppError> {
        let mut conn = self.pool.acquire().await?;
        Self::load(&mut conn, id).await
    }

    #[tracing::instrument(skip(self), fields(db.table = "channels", db.operation = "select"))]
    async fn list_visible_channels(
        &self,
        workspace_id: Uuid,
        viewer: Uuid,
    ) -> Result<Vec<Channel>, AppError> {
        let channels = sqlx::query_as::<Postgres, Channel>(&format!(
            r#"{CHANNEL_SELECT}
            WHERE c.workspace_id = $1
              AND (NOT c.is_private OR EXISTS (
                  SELECT 1 FROM channel_participants vp
                  WHERE vp.channel_id = c.id AND vp.user_id = $2
              ))
            GROUP BY c.id
            ORDER BY c.created_at ASC"#
        ))
        .bind(workspace_id)
        .bind(viewer)
        .fetch_all(&self.pool)
        .await?;
        Ok(channels)
    }

    #[tracing::instrument(skip(self, update), fields(db.table = "channels", db.operation = "update", db.record_id = %id))]
    async fn update_channel(
        &self,
        id: Uuid,
        update: ChannelUpdate,
    ) -> Result<Option<Channel>, AppError> {
        let new_name = update.name.as_deref().map(normalize_channel_name);
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        let Some(current_name) = Self::lock(&mut tx, id).await? else {
            tx.rollback().await?;
            return Ok(None);
        };

        if current_name == GENERAL_CHANNEL {
            let conflict = if new_name.as_deref().is_some_and(|n| n != GENERAL_CHANNEL) {
                Some("The general channel cannot be renamed")
            } else if update.is_private == Some(true) {
                Some("The general channel cannot be made private")
            } else {
                None
            };
            if let Some(message) = conflict {
                tx.rollback().await?;
                return Err(AppError::conflict(message));
            }
        }

        let conflict_name = new_name.clone().unwrap_or_default();
        sqlx::query(
            r#"
            UPDATE channels
            SET name = COALESCE($2, name),
                is_private = COALESCE($3, is_private),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(new_name)
        .bind(update.is_private)
        .execute(&mut **tx)
        .await
        .map_err(|e| conflict_on_unique(e, duplicate_name(&conflict_name)))?;

        let channel = Self::load(&mut tx, id).await?;
        tx.commit().await?;
        Ok(channel)
    }

    #[tracing::instrument(skip(self), fields(db.table = "channel_participants", db.operation = "insert"))]
    async fn add_participant(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Channel>, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        if Self::lock(&mut tx, channel_id).await?.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let inserted = sqlx::query(
            "INSERT INTO channel_participants (channel_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(channel_id)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
        if inserted.rows_affected() > 0 {
            sqlx::query("UPDATE channels SET updated_at = NOW() WHERE id = $1")
                .bind(channel_id)
                .execute(&mut **tx)
                .await?;
        }

        let channel = Self::load(&mut tx, channel_id).await?;
        tx.commit().await?;
        Ok(channel)
    }

    #[tracing::instrument(skip(self), fields(db.table = "channel_participants", db.operation = "delete"))]
    async fn remove_participant(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Channel>, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        let Some(name) = Self::lock(&mut tx, channel_id).await? else {
            tx.rollback().await?;
            return Ok(None);
        };
        if name == GENERAL_CHANNEL {
            tx.rollback().await?;
            return Err(AppError::conflict("The general channel cannot be left"));
        }

        let removed = sqlx::query(
            "DELETE FROM channel_participants WHERE channel_id = $1 AND user_id = $2",
        )
        .bind(channel_id)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
        if removed.rows_affected() > 0 {
            sqlx::query("UPDATE channels SET updated_at = NOW() WHERE id = $1")
                .bind(channel_id)
                .execute(&mut **tx)
                .await?;
        }

        let channel = Self::load(&mut tx, channel_id).await?;
        tx.commit().await?;
        Ok(channel)
    }

    #[tracing::instrument(skip(self), fields(db.table = "channels", db.operation = "delete", db.record_id = %id))]
    async fn delete_channel(&self, id: Uuid) -> Result<Option<Channel>, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        if Self::lock(&mut tx, id).await?.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }
        let Some(channel) = Self::load(&mut tx, id).await? else {
            tx.rollback().await?;
            return Ok(None);
        };
        if channel.is_general() {
            tx.rollback().await?;
            return Err(AppError::conflict("The general channel cannot be deleted"));
        }

        // messages, reactions and participants cascade via FKs
        sqlx::query("DELETE FROM channels WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        tx.commit().await?;

        Ok(Some(channel))
    }
}
