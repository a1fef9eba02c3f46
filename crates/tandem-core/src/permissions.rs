//! Permission engine
//!
//! Maps a workspace role to the set of permissions it owns and decides whether that set
//! satisfies a required permission. Roles are *not* a total order: each role carries a
//! literal permission set and the effective level is the maximum level found in it.

use crate::models::WorkspaceRole;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use utoipa::ToSchema;

/// A permission a workspace action can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Read,
    Write,
    Delete,
    ManageMembers,
    ManageSettings,
}

impl Permission {
    pub const ALL: [Permission; 5] = [
        Permission::Read,
        Permission::Write,
        Permission::Delete,
        Permission::ManageMembers,
        Permission::ManageSettings,
    ];

    pub const fn level(self) -> u8 {
        match self {
            Permission::Read => 1,
            Permission::Write => 2,
            Permission::Delete => 3,
            Permission::ManageMembers => 4,
            Permission::ManageSettings => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::Delete => "delete",
            Permission::ManageMembers => "manage_members",
            Permission::ManageSettings => "manage_settings",
        }
    }
}

impl Display for Permission {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`authorize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Allow,
    Deny,
}

impl Authorization {
    pub fn is_allowed(self) -> bool {
        matches!(self, Authorization::Allow)
    }
}

const OWNER_PERMISSIONS: &[Permission] = &[
    Permission::Read,
    Permission::Write,
    Permission::Delete,
    Permission::ManageMembers,
    Permission::ManageSettings,
];
const CORE_PERMISSIONS: &[Permission] = &[
    Permission::Read,
    Permission::Write,
    Permission::Delete,
    Permission::ManageMembers,
];
const CONTRIBUTOR_PERMISSIONS: &[Permission] = &[Permission::Read, Permission::Write];
const VIEWER_PERMISSIONS: &[Permission] = &[Permission::Read];

/// Permission set owned by a role. `None` (not a member) owns nothing.
pub fn permissions_for(role: Option<WorkspaceRole>) -> &'static [Permission] {
    match role {
        Some(WorkspaceRole::Owner) => OWNER_PERMISSIONS,
        Some(WorkspaceRole::Core) => CORE_PERMISSIONS,
        Some(WorkspaceRole::Contributor) => CONTRIBUTOR_PERMISSIONS,
        Some(WorkspaceRole::Viewer) => VIEWER_PERMISSIONS,
        None => &[],
    }
}

/// Highest permission level among the role's permission set, 0 when the set is empty.
pub fn effective_level(role: Option<WorkspaceRole>) -> u8 {
    permissions_for(role)
        .iter()
        .map(|p| p.level())
        .max()
        .unwrap_or(0)
}

/// Allow iff the role's effective level reaches the level of `required`.
pub fn authorize(role: Option<WorkspaceRole>, required: Permission) -> Authorization {
    if effective_level(role) >= required.level() {
        Authorization::Allow
    } else {
        Authorization::Deny
    }
}
