use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool, Postgres};
use std::collections::HashMap;
use tandem_core::models::{Attachment, Message, NewMessage, Reaction, ReactionToggle};
use tandem_core::AppError;
use uuid::Uuid;

use crate::db::store::MessageStore;
use crate::db::transaction::TransactionGuard;

const MESSAGE_COLUMNS: &str =
    "id, channel_id, workspace_id, sender_id, content, attachments, created_at";

#[derive(Debug, FromRow)]
struct MessageRow {
    id: Uuid,
    channel_id: Uuid,
    workspace_id: Uuid,
    sender_id: Uuid,
    content: String,
    attachments: Json<Vec<Attachment>>,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    fn into_message(self, reactions: Vec<Reaction>) -> Message {
        Message {
            id: self.id,
            channel_id: self.channel_id,
            workspace_id: self.workspace_id,
            sender_id: self.sender_id,
            content: self.content,
            attachments: self.attachments.0,
            reactions,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ReactionRow {
    message_id: Uuid,
    emoji: String,
    user_id: Uuid,
}

/// Repository for messages and their reactions
#[derive(Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Attach reaction sets to a batch of rows, preserving row order
    async fn with_reactions(
        conn: &mut PgConnection,
        rows: Vec<MessageRow>,
    ) -> Result<Vec<Message>, AppError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let reactions = sqlx::query_as::<Postgres, ReactionRow>(
            "SELECT message_id, emoji, user_id FROM message_reactions WHERE message_id = ANY($1) ORDER BY created_at ASC",
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<Reaction>> = HashMap::new();
        for r in reactions {
            grouped.entry(r.message_id).or_default().push(Reaction {
                emoji: r.emoji,
                user_id: r.user_id,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let reactions = grouped.remove(&row.id).unwrap_or_default();
                row.into_message(reactions)
            })
            .collect())
    }

    async fn load(conn: &mut PgConnection, id: Uuid) -> Result<Option<Message>, AppError> {
        let row = sqlx::query_as::<Postgres, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(Self::with_reactions(conn, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl MessageStore for MessageRepository {
    #[tracing::instrument(skip(self, new), fields(db.table = "messages", db.operation = "insert", channel_id = %new.channel_id))]
    async fn create_message(&self, new: NewMessage) -> Result<Message, AppError> {
        let row = sqlx::query_as::<Postgres, MessageRow>(&format!(
            r#"
            INSERT INTO messages (id, channel_id, workspace_id, sender_id, content, attachments)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.channel_id)
        .bind(new.workspace_id)
        .bind(new.sender_id)
        .bind(new.content)
        .bind(Json(new.attachments))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                AppError::not_found("Channel not found")
            }
            _ => AppError::Database(e),
        })?;

        Ok(row.into_message(Vec::new()))
    }

    #[tracing::instrument(skip(self), fields(db.table = "messages", db.operation = "select", db.record_id = %id))]
    async fn get_message(&self, id: Uuid) -> Result<Option<Message>, AppError> {
        let mut conn = self.pool.acquire().await?;
        Self::load(&mut conn, id).await
    }

    #[tracing::instrument(skip(self), fields(db.table = "messages", db.operation = "select"))]
    async fn list_messages(
        &self,
        channel_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, AppError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<Postgres, MessageRow>(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS} FROM (
                SELECT {MESSAGE_COLUMNS}, seq FROM messages
                WHERE channel_id = $1
                ORDER BY seq DESC
                LIMIT $2 OFFSET $3
            ) page
            ORDER BY seq ASC
            "#
        ))
        .bind(channel_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        Self::with_reactions(&mut conn, rows).await
    }

    #[tracing::instrument(skip(self), fields(db.table = "messages", db.operation = "delete", db.record_id = %id))]
    async fn delete_message(
        &self,
        id: Uuid,
        sender_id: Uuid,
    ) -> Result<Option<Message>, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        let Some(message) = Self::load(&mut tx, id).await? else {
            tx.rollback().await?;
            return Ok(None);
        };

        let deleted = sqlx::query("DELETE FROM messages WHERE id = $1 AND sender_id = $2")
            .bind(id)
            .bind(sender_id)
            .execute(&mut **tx)
            .await?;
        tx.commit().await?;

        Ok((deleted.rows_affected() > 0).then_some(message))
    }

    #[tracing::instrument(skip(self), fields(db.table = "message_reactions", db.operation = "toggle"))]
    async fn toggle_reaction(
        &self,
        message_id: Uuid,
        emoji: &str,
        user_id: Uuid,
    ) -> Result<Option<ReactionToggle>, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        let exists = sqlx::query_scalar::<Postgres, Uuid>(
            "SELECT id FROM messages WHERE id = $1 FOR SHARE",
        )
        .bind(message_id)
        .fetch_optional(&mut **tx)
        .await?;
        if exists.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let removed = sqlx::query(
            "DELETE FROM message_reactions WHERE message_id = $1 AND emoji = $2 AND user_id = $3",
        )
        .bind(message_id)
        .bind(emoji)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

        let added = if removed.rows_affected() == 0 {
            sqlx::query(
                "INSERT INTO message_reactions (message_id, emoji, user_id) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            )
            .bind(message_id)
            .bind(emoji)
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
            true
        } else {
            false
        };

        let message = Self::load(&mut tx, message_id).await?;
        tx.commit().await?;
        Ok(message.map(|message| ReactionToggle { message, added }))
    }
}
