use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::channel::Channel;
use crate::constants::GENERAL_CHANNEL;

/// Role a user holds inside a workspace
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "workspace_role", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceRole {
    Owner,
    Core,
    Contributor,
    Viewer,
}

impl WorkspaceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceRole::Owner => "owner",
            WorkspaceRole::Core => "core",
            WorkspaceRole::Contributor => "contributor",
            WorkspaceRole::Viewer => "viewer",
        }
    }
}

impl Display for WorkspaceRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkspaceRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(WorkspaceRole::Owner),
            "core" => Ok(WorkspaceRole::Core),
            "contributor" => Ok(WorkspaceRole::Contributor),
            "viewer" => Ok(WorkspaceRole::Viewer),
            other => Err(format!("Unknown workspace role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct WorkspaceMember {
    pub user_id: Uuid,
    pub role: WorkspaceRole,
    pub joined_at: DateTime<Utc>,
}

/// Link to the externally-hosted repository a workspace mirrors
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct RepositoryLink {
    /// e.g. "github"
    pub provider: String,
    pub external_id: String,
    pub full_name: String,
    pub url: String,
    pub default_branch: String,
    /// Set once webhook registration succeeded after import
    pub webhook_id: Option<String>,
}

/// Workspace document: the workspace row assembled with its members and channels
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Workspace {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub repository: RepositoryLink,
    pub members: Vec<WorkspaceMember>,
    pub channels: Vec<Channel>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workspace {
    pub fn role_of(&self, user_id: Uuid) -> Option<WorkspaceRole> {
        self.members
            .iter()
            .find(|m| m.user_id == user_id)
            .map(|m| m.role)
    }

    pub fn owner_count(&self) -> usize {
        self.members
            .iter()
            .filter(|m| m.role == WorkspaceRole::Owner)
            .count()
    }

    pub fn general_channel(&self) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == GENERAL_CHANNEL)
    }

    /// Copy of this document with private channels the viewer cannot read removed
    pub fn visible_to(&self, viewer: Uuid) -> Workspace {
        let mut view = self.clone();
        view.channels.retain(|c| c.can_read(viewer));
        view
    }
}

/// Row used by active/discovery listings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct WorkspaceSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub repository_full_name: String,
    pub repository_url: String,
    pub member_count: i64,
    /// Role of the requesting user, absent on discovery listings
    pub role: Option<WorkspaceRole>,
    pub created_at: DateTime<Utc>,
}

/// Input for atomic workspace creation
#[derive(Debug, Clone)]
pub struct NewWorkspace {
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub repository: RepositoryLink,
}

#[derive(Debug, Clone, Default)]
pub struct WorkspaceUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl WorkspaceUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.tags.is_none()
    }
}

/// Member joined with the user's profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MemberProfile {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: WorkspaceRole,
    pub joined_at: DateTime<Utc>,
}

/// Request DTO for importing a repository as a workspace
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateWorkspaceRequest {
    /// Repository in `owner/name` form
    #[validate(length(
        min = 3,
        max = 200,
        message = "Repository name must be between 3 and 200 characters"
    ))]
    pub repository: String,
    #[validate(length(
        min = 1,
        max = 100,
        message = "Workspace name must be between 1 and 100 characters"
    ))]
    pub name: Option<String>,
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
    #[serde(default)]
    #[validate(length(max = 20, message = "At most 20 tags are allowed"))]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateWorkspaceRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Workspace name must be between 1 and 100 characters"
    ))]
    pub name: Option<String>,
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
    #[validate(length(max = 20, message = "At most 20 tags are allowed"))]
    pub tags: Option<Vec<String>>,
}

impl From<UpdateWorkspaceRequest> for WorkspaceUpdate {
    fn from(req: UpdateWorkspaceRequest) -> Self {
        WorkspaceUpdate {
            name: req.name.map(|n| n.trim().to_string()),
            description: req.description,
            tags: req.tags.map(normalize_tags),
        }
    }
}

/// Request DTO for inviting a user into a workspace
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AddMemberRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Username must be between 1 and 100 characters"
    ))]
    pub username: String,
    #[serde(default = "default_invite_role")]
    pub role: WorkspaceRole,
}

fn default_invite_role() -> WorkspaceRole {
    WorkspaceRole::Viewer
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateMemberRoleRequest {
    pub role: WorkspaceRole,
}

/// Trim, lowercase and de-duplicate tags, dropping empty ones
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}
