use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Postgres};
use tandem_core::constants::GENERAL_CHANNEL;
use tandem_core::models::{
    Channel, MemberProfile, NewWorkspace, RepositoryLink, Workspace, WorkspaceMember,
    WorkspaceRole, WorkspaceSummary, WorkspaceUpdate,
};
use tandem_core::AppError;
use uuid::Uuid;

use super::channels::CHANNEL_SELECT;
use super::conflict_on_unique;
use crate::db::store::WorkspaceStore;
use crate::db::transaction::TransactionGuard;

const WORKSPACE_COLUMNS: &str = "id, owner_id, name, description, tags, repo_provider, \
     repo_external_id, repo_full_name, repo_url, repo_default_branch, webhook_id, created_at, \
     updated_at";

#[derive(Debug, FromRow)]
struct WorkspaceRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    description: Option<String>,
    tags: Vec<String>,
    repo_provider: String,
    repo_external_id: String,
    repo_full_name: String,
    repo_url: String,
    repo_default_branch: String,
    webhook_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WorkspaceRow {
    fn into_workspace(self, members: Vec<WorkspaceMember>, channels: Vec<Channel>) -> Workspace {
        Workspace {
            id: self.id,
            owner_id: self.owner_id,
            name: self.name,
            description: self.description,
            tags: self.tags,
            repository: RepositoryLink {
                provider: self.repo_provider,
                external_id: self.repo_external_id,
                full_name: self.repo_full_name,
                url: self.repo_url,
                default_branch: self.repo_default_branch,
                webhook_id: self.webhook_id,
            },
            members,
            channels,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct SummaryRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    tags: Vec<String>,
    repo_full_name: String,
    repo_url: String,
    member_count: i64,
    role: Option<WorkspaceRole>,
    created_at: DateTime<Utc>,
}

impl From<SummaryRow> for WorkspaceSummary {
    fn from(row: SummaryRow) -> Self {
        WorkspaceSummary {
            id: row.id,
            name: row.name,
            description: row.description,
            tags: row.tags,
            repository_full_name: row.repo_full_name,
            repository_url: row.repo_url,
            member_count: row.member_count,
            role: row.role,
            created_at: row.created_at,
        }
    }
}

/// Repository for workspaces and their memberships
#[derive(Clone)]
pub struct WorkspaceRepository {
    pool: PgPool,
}

impl WorkspaceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Assemble the workspace document (row + members + channels) on one connection
    async fn load(conn: &mut PgConnection, id: Uuid) -> Result<Option<Workspace>, AppError> {
        let Some(row) = sqlx::query_as::<Postgres, WorkspaceRow>(&format!(
            "SELECT {WORKSPACE_COLUMNS} FROM workspaces WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        else {
            return Ok(None);
        };

        let members = sqlx::query_as::<Postgres, WorkspaceMember>(
            "SELECT user_id, role, joined_at FROM workspace_members WHERE workspace_id = $1 ORDER BY joined_at ASC",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        let channels = sqlx::query_as::<Postgres, Channel>(&format!(
            "{CHANNEL_SELECT} WHERE c.workspace_id = $1 GROUP BY c.id ORDER BY c.created_at ASC"
        ))
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(Some(row.into_workspace(members, channels)))
    }

    /// Lock the workspace row and return the member's current role
    async fn lock_member(
        conn: &mut PgConnection,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Option<WorkspaceRole>>, AppError> {
        let exists = sqlx::query_scalar::<Postgres, Uuid>(
            "SELECT id FROM workspaces WHERE id = $1 FOR UPDATE",
        )
        .bind(workspace_id)
        .fetch_optional(&mut *conn)
        .await?;
        if exists.is_none() {
            return Ok(None);
        }

        let role = sqlx::query_scalar::<Postgres, WorkspaceRole>(
            "SELECT role FROM workspace_members WHERE workspace_id = $1 AND user_id = $2",
        )
        .bind(workspace_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(Some(role))
    }

    async fn owner_count(conn: &mut PgConnection, workspace_id: Uuid) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<Postgres, i64>(
            "SELECT COUNT(*) FROM workspace_members WHERE workspace_id = $1 AND role = 'owner'",
        )
        .bind(workspace_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count)
    }
}

fn last_owner_conflict() -> AppError {
    AppError::conflict("A workspace must keep at least one owner")
}

#[async_trait]
impl WorkspaceStore for WorkspaceRepository {
    #[tracing::instrument(skip(self, new), fields(db.table = "workspaces", db.operation = "insert", repository = %new.repository.full_name))]
    async fn create_workspace(&self, new: NewWorkspace) -> Result<Workspace, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        let id = Uuid::new_v4();
        let full_name = new.repository.full_name.clone();

        sqlx::query(
            r#"
            INSERT INTO workspaces (id, owner_id, name, description, tags, repo_provider,
                repo_external_id, repo_full_name, repo_url, repo_default_branch)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(id)
        .bind(new.owner_id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.tags)
        .bind(&new.repository.provider)
        .bind(&new.repository.external_id)
        .bind(&new.repository.full_name)
        .bind(&new.repository.url)
        .bind(&new.repository.default_branch)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            conflict_on_unique(
                e,
                format!("Repository '{}' has already been imported", full_name),
            )
        })?;

        sqlx::query(
            "INSERT INTO workspace_members (workspace_id, user_id, role) VALUES ($1, $2, 'owner')",
        )
        .bind(id)
        .bind(new.owner_id)
        .execute(&mut **tx)
        .await?;

        let general_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO channels (id, workspace_id, name, is_private, created_by) VALUES ($1, $2, $3, FALSE, $4)",
        )
        .bind(general_id)
        .bind(id)
        .bind(GENERAL_CHANNEL)
        .bind(new.owner_id)
        .execute(&mut **tx)
        .await?;

        sqlx::query("INSERT INTO channel_participants (channel_id, user_id) VALUES ($1, $2)")
            .bind(general_id)
            .bind(new.owner_id)
            .execute(&mut **tx)
            .await?;

        let updated = sqlx::query(
            "UPDATE users SET owned_workspace_ids = array_append(owned_workspace_ids, $1), updated_at = NOW() WHERE id = $2",
        )
        .bind(id)
        .bind(new.owner_id)
        .execute(&mut **tx)
        .await?;
        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(AppError::not_found("Owner not found"));
        }

        let workspace = Self::load(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::Internal("Workspace vanished after insert".to_string()))?;
        tx.commit().await?;

        tracing::info!(workspace_id = %id, "Workspace created");
        Ok(workspace)
    }

    #[tracing::instrument(skip(self), fields(db.table = "workspaces", db.operation = "select", db.record_id = %id))]
    async fn get_workspace(&self, id: Uuid) -> Result<Option<Workspace>, AppError> {
        let mut conn = self.pool.acquire().await?;
        Self::load(&mut conn, id).await
    }

    #[tracing::instrument(skip(self), fields(db.table = "workspaces", db.operation = "select"))]
    async fn find_by_repository(
        &self,
        provider: &str,
        external_id: &str,
    ) -> Result<Option<Workspace>, AppError> {
        let mut conn = self.pool.acquire().await?;
        let id = sqlx::query_scalar::<Postgres, Uuid>(
            "SELECT id FROM workspaces WHERE repo_provider = $1 AND repo_external_id = $2",
        )
        .bind(provider)
        .bind(external_id)
        .fetch_optional(&mut *conn)
        .await?;

        match id {
            Some(id) => Self::load(&mut conn, id).await,
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self), fields(db.table = "workspaces", db.operation = "select"))]
    async fn list_for_member(&self, user_id: Uuid) -> Result<Vec<WorkspaceSummary>, AppError> {
        let rows = sqlx::query_as::<Postgres, SummaryRow>(
            r#"
            SELECT w.id, w.name, w.description, w.tags, w.repo_full_name, w.repo_url,
                (SELECT COUNT(*) FROM workspace_members c WHERE c.workspace_id = w.id) AS member_count,
                m.role,
                w.created_at
            FROM workspaces w
            JOIN workspace_members m ON m.workspace_id = w.id AND m.user_id = $1
            ORDER BY w.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(WorkspaceSummary::from).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "workspaces", db.operation = "select"))]
    async fn list_discoverable(&self, user_id: Uuid) -> Result<Vec<WorkspaceSummary>, AppError> {
        let rows = sqlx::query_as::<Postgres, SummaryRow>(
            r#"
            SELECT w.id, w.name, w.description, w.tags, w.repo_full_name, w.repo_url,
                (SELECT COUNT(*) FROM workspace_members c WHERE c.workspace_id = w.id) AS member_count,
                NULL::workspace_role AS role,
                w.created_at
            FROM workspaces w
            WHERE NOT EXISTS (
                SELECT 1 FROM workspace_members m WHERE m.workspace_id = w.id AND m.user_id = $1
            )
            ORDER BY w.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(WorkspaceSummary::from).collect())
    }

    #[tracing::instrument(skip(self, update), fields(db.table = "workspaces", db.operation = "update", db.record_id = %id))]
    async fn update_workspace(
        &self,
        id: Uuid,
        update: WorkspaceUpdate,
    ) -> Result<Option<Workspace>, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        let result = sqlx::query(
            r#"
            UPDATE workspaces
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                tags = COALESCE($4, tags),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.name)
        .bind(update.description)
        .bind(update.tags)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }
        let workspace = Self::load(&mut tx, id).await?;
        tx.commit().await?;
        Ok(workspace)
    }

    #[tracing::instrument(skip(self), fields(db.table = "workspaces", db.operation = "update", db.record_id = %id))]
    async fn set_webhook_id(
        &self,
        id: Uuid,
        webhook_id: Option<String>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE workspaces SET webhook_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(webhook_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "workspaces", db.operation = "delete", db.record_id = %id))]
    async fn delete_workspace(&self, id: Uuid) -> Result<Option<Workspace>, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        let Some(workspace) = Self::load(&mut tx, id).await? else {
            tx.rollback().await?;
            return Ok(None);
        };

        // channels, participants, messages, reactions and activity cascade via FKs
        sqlx::query("DELETE FROM workspaces WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        sqlx::query(
            "UPDATE users SET owned_workspace_ids = array_remove(owned_workspace_ids, $1) WHERE $1 = ANY(owned_workspace_ids)",
        )
        .bind(id)
        .execute(&mut **tx)
        .await?;
        tx.commit().await?;

        Ok(Some(workspace))
    }

    #[tracing::instrument(skip(self), fields(db.table = "workspace_members", db.operation = "select"))]
    async fn member_role(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<WorkspaceRole>, AppError> {
        let role = sqlx::query_scalar::<Postgres, WorkspaceRole>(
            "SELECT role FROM workspace_members WHERE workspace_id = $1 AND user_id = $2",
        )
        .bind(workspace_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role)
    }

    #[tracing::instrument(skip(self), fields(db.table = "workspace_members", db.operation = "select"))]
    async fn list_members(&self, workspace_id: Uuid) -> Result<Vec<MemberProfile>, AppError> {
        let members = sqlx::query_as::<Postgres, MemberProfile>(
            r#"
            SELECT m.user_id, u.username, u.display_name, u.avatar_url, m.role, m.joined_at
            FROM workspace_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.workspace_id = $1
            ORDER BY m.joined_at ASC
            "#,
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }

    #[tracing::instrument(skip(self), fields(db.table = "workspace_members", db.operation = "insert"))]
    async fn add_member(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
        role: WorkspaceRole,
    ) -> Result<Option<WorkspaceMember>, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        match Self::lock_member(&mut tx, workspace_id, user_id).await? {
            None => {
                tx.rollback().await?;
                return Ok(None);
            }
            Some(Some(_)) => {
                tx.rollback().await?;
                return Err(AppError::conflict(
                    "User is already a member of this workspace",
                ));
            }
            Some(None) => {}
        }

        let member = sqlx::query_as::<Postgres, WorkspaceMember>(
            r#"
            INSERT INTO workspace_members (workspace_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING user_id, role, joined_at
            "#,
        )
        .bind(workspace_id)
        .bind(user_id)
        .bind(role)
        .fetch_one(&mut **tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO channel_participants (channel_id, user_id)
            SELECT id, $2 FROM channels WHERE workspace_id = $1 AND name = $3
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(workspace_id)
        .bind(user_id)
        .bind(GENERAL_CHANNEL)
        .execute(&mut **tx)
        .await?;

        tx.commit().await?;
        Ok(Some(member))
    }

    #[tracing::instrument(skip(self), fields(db.table = "workspace_members", db.operation = "update"))]
    async fn set_member_role(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
        role: WorkspaceRole,
    ) -> Result<Option<WorkspaceMember>, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        let Some(Some(current)) = Self::lock_member(&mut tx, workspace_id, user_id).await? else {
            tx.rollback().await?;
            return Ok(None);
        };
        if current == WorkspaceRole::Owner
            && role != WorkspaceRole::Owner
            && Self::owner_count(&mut tx, workspace_id).await? <= 1
        {
            tx.rollback().await?;
            return Err(last_owner_conflict());
        }

        let member = sqlx::query_as::<Postgres, WorkspaceMember>(
            r#"
            UPDATE workspace_members SET role = $3
            WHERE workspace_id = $1 AND user_id = $2
            RETURNING user_id, role, joined_at
            "#,
        )
        .bind(workspace_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(&mut **tx)
        .await?;
        tx.commit().await?;
        Ok(member)
    }

    #[tracing::instrument(skip(self), fields(db.table = "workspace_members", db.operation = "delete"))]
    async fn remove_member(&self, workspace_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        let Some(Some(current)) = Self::lock_member(&mut tx, workspace_id, user_id).await? else {
            tx.rollback().await?;
            return Ok(false);
        };
        if current == WorkspaceRole::Owner && Self::owner_count(&mut tx, workspace_id).await? <= 1 {
            tx.rollback().await?;
            return Err(last_owner_conflict());
        }

        sqlx::query(
            r#"
            DELETE FROM channel_participants
            WHERE user_id = $2
              AND channel_id IN (SELECT id FROM channels WHERE workspace_id = $1)
            "#,
        )
        .bind(workspace_id)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

        let removed = sqlx::query(
            "DELETE FROM workspace_members WHERE workspace_id = $1 AND user_id = $2",
        )
        .bind(workspace_id)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
        tx.commit().await?;

        Ok(removed.rows_affected() > 0)
    }
}
