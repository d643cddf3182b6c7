//! Project-level access checks that sit below the permission gate.
//!
//! The permission gate answers "may this role do X at all"; these helpers
//! answer "may this caller do X on this particular project".

use workboard_core::ProjectId;
use workboard_infra::store::{ProjectRecord, Store};

use crate::app::errors::{ApiError, ApiResult};
use crate::context::RequestContext;

pub const PROJECT_NOT_FOUND: &str = "Project not found";
pub const NOT_ASSIGNED: &str = "Not assigned to project";

/// Load a project of the caller's tenant. Other tenants' projects are 404.
pub async fn tenant_project(store: &dyn Store, ctx: &RequestContext, project_id: ProjectId) -> ApiResult<ProjectRecord> {
    store
        .find_project(ctx.tenant_id(), project_id)
        .await?
        .ok_or_else(|| ApiError::not_found(PROJECT_NOT_FOUND))
}

/// OWNER/ADMIN pass; everyone else must be a member of the project.
pub async fn require_project_access(store: &dyn Store, ctx: &RequestContext, project_id: ProjectId) -> ApiResult<()> {
    if ctx.is_tenant_admin() {
        return Ok(());
    }
    match store
        .find_project_member(ctx.tenant_id(), project_id, ctx.user_id())
        .await?
    {
        Some(_) => Ok(()),
        None => Err(ApiError::forbidden(NOT_ASSIGNED)),
    }
}
