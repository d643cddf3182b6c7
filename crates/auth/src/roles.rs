use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role a user holds within a tenant membership (and within a project).
///
/// Privilege is ordered only by convention (`Owner` ⊇ `Admin` ⊇ `Member` ⊇
/// `Viewer`); each role's grants are enumerated explicitly in the
/// [`PermissionTable`](crate::PermissionTable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Owner,
    Admin,
    Member,
    Viewer,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl Role {
    /// All roles, most privileged first.
    pub const ALL: [Role; 4] = [Role::Owner, Role::Admin, Role::Member, Role::Viewer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "OWNER",
            Role::Admin => "ADMIN",
            Role::Member => "MEMBER",
            Role::Viewer => "VIEWER",
        }
    }

    /// Tenant-wide administrators see every project without a project membership.
    pub fn is_tenant_admin(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Role::Owner => "Workspace owner with every permission, including billing",
            Role::Admin => "Manages members, projects and tasks; no billing or deletions of projects",
            Role::Member => "Works on tasks in the projects they are assigned to",
            Role::Viewer => "Read-only access to assigned projects",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}
