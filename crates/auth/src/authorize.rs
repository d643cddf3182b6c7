use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use thiserror::Error;

use crate::{Permission, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(Permission),
}

/// Static role → permission mapping.
///
/// Built once at process start and shared read-only (`Arc<PermissionTable>`);
/// there is no way to mutate it after construction.
#[derive(Debug, Clone)]
pub struct PermissionTable {
    grants: HashMap<Role, BTreeSet<Permission>>,
}

impl PermissionTable {
    /// Build a table from explicit grants. Roles not listed get no permissions.
    pub fn from_grants<I, P>(grants: I) -> Self
    where
        I: IntoIterator<Item = (Role, P)>,
        P: IntoIterator<Item = Permission>,
    {
        let grants = grants
            .into_iter()
            .map(|(role, perms)| (role, perms.into_iter().collect()))
            .collect();
        Self { grants }
    }

    /// The workspace's role table.
    pub fn standard() -> Self {
        use Permission::*;

        Self::from_grants([
            (
                Role::Owner,
                vec![
                    ProjectCreate,
                    ProjectRead,
                    ProjectUpdate,
                    ProjectDelete,
                    TaskCreate,
                    TaskRead,
                    TaskUpdate,
                    TaskDelete,
                    BillingManage,
                    MemberInvite,
                    AuditRead,
                ],
            ),
            (
                Role::Admin,
                vec![
                    ProjectCreate,
                    ProjectRead,
                    ProjectUpdate,
                    TaskCreate,
                    TaskRead,
                    TaskUpdate,
                    MemberInvite,
                    AuditRead,
                ],
            ),
            (Role::Member, vec![ProjectRead, TaskCreate, TaskRead, TaskUpdate]),
            (Role::Viewer, vec![ProjectRead, TaskRead]),
        ])
    }

    /// Pure lookup. A role missing from the table is granted nothing.
    pub fn allowed(&self, role: Role, permission: Permission) -> bool {
        self.grants
            .get(&role)
            .is_some_and(|perms| perms.contains(&permission))
    }

    /// Permissions granted to `role`, in stable order.
    pub fn permissions_for(&self, role: Role) -> Vec<Permission> {
        self.grants
            .get(&role)
            .map(|perms| perms.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Display view of the table for the RBAC inspection endpoint.
    pub fn role_definitions(&self) -> Vec<RoleDefinition> {
        Role::ALL
            .into_iter()
            .map(|role| RoleDefinition {
                name: role,
                description: role.description(),
                permissions: self.permissions_for(role),
            })
            .collect()
    }
}

impl Default for PermissionTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Role definition with its granted permissions (for audit/display).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleDefinition {
    pub name: Role,
    pub description: &'static str,
    pub permissions: Vec<Permission>,
}

/// Authorize a role for a single permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(table: &PermissionTable, role: Role, required: Permission) -> Result<(), AuthzError> {
    if table.allowed(role, required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn is_superset(table: &PermissionTable, upper: Role, lower: Role) -> bool {
        Permission::ALL
            .into_iter()
            .all(|p| !table.allowed(lower, p) || table.allowed(upper, p))
    }

    #[test]
    fn standard_table_is_monotone_by_privilege() {
        let table = PermissionTable::standard();
        assert!(is_superset(&table, Role::Owner, Role::Admin));
        assert!(is_superset(&table, Role::Admin, Role::Member));
        assert!(is_superset(&table, Role::Member, Role::Viewer));
    }

    #[test]
    fn owner_holds_every_permission() {
        let table = PermissionTable::standard();
        assert_eq!(table.permissions_for(Role::Owner).len(), Permission::ALL.len());
    }

    #[test]
    fn admin_cannot_manage_billing_or_delete() {
        let table = PermissionTable::standard();
        assert!(!table.allowed(Role::Admin, Permission::BillingManage));
        assert!(!table.allowed(Role::Admin, Permission::ProjectDelete));
        assert!(!table.allowed(Role::Admin, Permission::TaskDelete));
        assert!(table.allowed(Role::Admin, Permission::MemberInvite));
        assert_eq!(
            authorize(&table, Role::Member, Permission::ProjectDelete),
            Err(AuthzError::Forbidden(Permission::ProjectDelete))
        );
    }

    #[test]
    fn missing_roles_fail_closed() {
        let table = PermissionTable::from_grants([(Role::Owner, vec![Permission::AuditRead])]);
        assert!(table.allowed(Role::Owner, Permission::AuditRead));
        assert!(!table.allowed(Role::Viewer, Permission::ProjectRead));
        assert!(table.permissions_for(Role::Viewer).is_empty());

        // Unknown role names never become a `Role`, so they cannot reach the table.
        assert!("SUPERUSER".parse::<Role>().is_err());
    }

    proptest! {
        #[test]
        fn allowed_is_deterministic(
            role in prop::sample::select(Role::ALL.to_vec()),
            perm in prop::sample::select(Permission::ALL.to_vec()),
        ) {
            let table = PermissionTable::standard();
            let first = table.allowed(role, perm);
            prop_assert_eq!(first, table.allowed(role, perm));
            prop_assert_eq!(first, authorize(&table, role, perm).is_ok());
            prop_assert_eq!(first, table.permissions_for(role).contains(&perm));
        }

        #[test]
        fn owner_allows_whatever_anyone_allows(
            role in prop::sample::select(Role::ALL.to_vec()),
            perm in prop::sample::select(Permission::ALL.to_vec()),
        ) {
            let table = PermissionTable::standard();
            prop_assert!(!table.allowed(role, perm) || table.allowed(Role::Owner, perm));
        }
    }
}
