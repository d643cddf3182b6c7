use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Atomic capability gating one class of operation.
///
/// Permissions are coarse-grained (role → allowed actions); they are never
/// parameterized by resource instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "project:create")]
    ProjectCreate,
    #[serde(rename = "project:read")]
    ProjectRead,
    #[serde(rename = "project:update")]
    ProjectUpdate,
    #[serde(rename = "project:delete")]
    ProjectDelete,
    #[serde(rename = "task:create")]
    TaskCreate,
    #[serde(rename = "task:read")]
    TaskRead,
    #[serde(rename = "task:update")]
    TaskUpdate,
    #[serde(rename = "task:delete")]
    TaskDelete,
    #[serde(rename = "billing:manage")]
    BillingManage,
    #[serde(rename = "member:invite")]
    MemberInvite,
    #[serde(rename = "audit:read")]
    AuditRead,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown permission '{0}'")]
pub struct UnknownPermission(pub String);

impl Permission {
    pub const ALL: [Permission; 11] = [
        Permission::ProjectCreate,
        Permission::ProjectRead,
        Permission::ProjectUpdate,
        Permission::ProjectDelete,
        Permission::TaskCreate,
        Permission::TaskRead,
        Permission::TaskUpdate,
        Permission::TaskDelete,
        Permission::BillingManage,
        Permission::MemberInvite,
        Permission::AuditRead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ProjectCreate => "project:create",
            Permission::ProjectRead => "project:read",
            Permission::ProjectUpdate => "project:update",
            Permission::ProjectDelete => "project:delete",
            Permission::TaskCreate => "task:create",
            Permission::TaskRead => "task:read",
            Permission::TaskUpdate => "task:update",
            Permission::TaskDelete => "task:delete",
            Permission::BillingManage => "billing:manage",
            Permission::MemberInvite => "member:invite",
            Permission::AuditRead => "audit:read",
        }
    }

    /// Resource half of `resource:action`.
    pub fn category(&self) -> &'static str {
        self.as_str().split(':').next().unwrap_or_default()
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_str_matches_serde_and_parse() {
        for perm in Permission::ALL {
            let json = serde_json::to_value(perm).unwrap();
            assert_eq!(json.as_str(), Some(perm.as_str()));
            assert_eq!(perm.as_str().parse::<Permission>().unwrap(), perm);
        }
    }

    #[test]
    fn category_is_resource_prefix() {
        assert_eq!(Permission::BillingManage.category(), "billing");
        assert_eq!(Permission::TaskDelete.category(), "task");
        assert!("task:archive".parse::<Permission>().is_err());
    }
}
