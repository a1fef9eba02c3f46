use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use tandem_core::models::{User, UserProfile};
use tandem_core::AppError;
use uuid::Uuid;

use super::conflict_on_unique;
use crate::db::store::UserStore;

const USER_COLUMNS: &str =
    "id, username, display_name, avatar_url, owned_workspace_ids, created_at, updated_at";

/// Repository for users mirrored from the identity provider
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for UserRepository {
    #[tracing::instrument(skip(self, profile), fields(db.table = "users", db.operation = "upsert", db.record_id = %profile.id))]
    async fn upsert_user(&self, profile: UserProfile) -> Result<User, AppError> {
        let query = format!(
            r#"
            INSERT INTO users (id, username, display_name, avatar_url)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
                SET username = EXCLUDED.username,
                    display_name = EXCLUDED.display_name,
                    avatar_url = EXCLUDED.avatar_url,
                    updated_at = NOW()
            RETURNING {USER_COLUMNS}
            "#
        );
        let username = profile.username.clone();
        sqlx::query_as::<Postgres, User>(&query)
            .bind(profile.id)
            .bind(profile.username)
            .bind(profile.display_name)
            .bind(profile.avatar_url)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, format!("Username '{}' is already taken", username)))
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select", db.record_id = %id))]
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<Postgres, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select"))]
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<Postgres, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(username) = LOWER($1)"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    #[tracing::instrument(skip(self, usernames), fields(db.table = "users", db.operation = "select", count = usernames.len()))]
    async fn find_by_usernames(&self, usernames: &[String]) -> Result<Vec<User>, AppError> {
        if usernames.is_empty() {
            return Ok(Vec::new());
        }
        let lowered: Vec<String> = usernames.iter().map(|u| u.to_lowercase()).collect();
        let users = sqlx::query_as::<Postgres, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(username) = ANY($1)"
        ))
        .bind(lowered)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}
