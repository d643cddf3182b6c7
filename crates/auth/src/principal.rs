use serde::{Deserialize, Serialize};

use workboard_core::{TenantId, UserId};

use crate::Role;

/// Who is acting, in which tenant, with which role.
///
/// This is what gets embedded in an identity token at signup/login.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub role: Role,
}

/// A caller whose bearer token verified.
///
/// Only [`authenticate`](crate::gate::authenticate) can build one. The tenant
/// is still unchecked at this stage.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Authenticated {
    user_id: UserId,
    tenant_id: Option<TenantId>,
    role: Role,
}

impl Authenticated {
    pub(crate) fn new(user_id: UserId, tenant_id: Option<TenantId>, role: Role) -> Self {
        Self { user_id, tenant_id, role }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub(crate) fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }
}

/// Request identity context: an authenticated caller bound to a tenant.
///
/// Only [`Authenticated::require_tenant`] can build one, so holding a
/// `TenantScoped` proves both the authentication and tenant gates passed.
/// Handlers take the tenant id from here and nowhere else.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantScoped {
    identity: Identity,
}

impl TenantScoped {
    pub(crate) fn new(identity: Identity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn user_id(&self) -> UserId {
        self.identity.user_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.identity.tenant_id
    }

    pub fn role(&self) -> Role {
        self.identity.role
    }
}
