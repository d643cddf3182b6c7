use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use workboard_auth::{Permission, Role};
use workboard_core::{BoardId, ProjectId, ProjectMemberId, UserId};
use workboard_infra::AuditEntry;
use workboard_infra::store::{BoardRecord, ProjectMemberRecord, ProjectRecord, ProjectWithBoards, TaskRecord};

use crate::app::dto::{AddProjectMemberRequest, CreateProjectRequest, OkResponse, ProjectMemberView};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::common::id_or_not_found;
use crate::app::services::AppServices;
use crate::authz::{PROJECT_NOT_FOUND, require_project_access, tenant_project};
use crate::context::{RequestContext, ValidatedJson};
use crate::middleware::gated;

/// Boards every new project starts with, in display order.
pub const DEFAULT_BOARDS: [&str; 3] = ["Backlog", "In Progress", "Done"];

pub fn router() -> Router {
    Router::new()
        .route(
            "/",
            gated(get(list_projects), Permission::ProjectRead)
                .merge(gated(post(create_project), Permission::ProjectCreate)),
        )
        .route("/:id", gated(delete(delete_project), Permission::ProjectDelete))
        .route("/:id/tasks", gated(get(list_project_tasks), Permission::TaskRead))
        .route(
            "/:id/members",
            gated(get(list_project_members), Permission::ProjectRead)
                .merge(gated(post(add_project_member), Permission::ProjectUpdate)),
        )
        .route(
            "/:id/members/:user_id",
            gated(delete(remove_project_member), Permission::ProjectUpdate),
        )
}

/// GET /projects - Visible projects with their boards
pub async fn list_projects(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: RequestContext,
) -> ApiResult<Json<Vec<ProjectWithBoards>>> {
    let member_filter = (!ctx.is_tenant_admin()).then(|| ctx.user_id());
    let projects = services.store.list_projects(ctx.tenant_id(), member_filter).await?;
    Ok(Json(projects))
}

/// POST /projects - Create a project with default boards; the creator becomes project OWNER
pub async fn create_project(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: RequestContext,
    ValidatedJson(body): ValidatedJson<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<ProjectRecord>)> {
    let now = Utc::now();
    let tenant_id = ctx.tenant_id();

    let project = ProjectRecord {
        id: ProjectId::new(),
        tenant_id,
        name: body.name,
        description: body.description,
        created_by_id: ctx.user_id(),
        created_at: now,
    };
    let boards = DEFAULT_BOARDS
        .iter()
        .zip(0..)
        .map(|(name, position)| BoardRecord {
            id: BoardId::new(),
            tenant_id,
            project_id: project.id,
            name: name.to_string(),
            position,
            created_at: now,
        })
        .collect();
    let owner = ProjectMemberRecord {
        id: ProjectMemberId::new(),
        tenant_id,
        project_id: project.id,
        user_id: ctx.user_id(),
        role: Role::Owner,
        created_at: now,
    };

    services
        .store
        .create_project(project.clone(), boards, vec![owner])
        .await?;

    tracing::info!(%tenant_id, project_id = %project.id, "project created");
    services
        .audit
        .record_best_effort(
            AuditEntry::new(tenant_id, ctx.user_id(), "project.created", "project", project.id)
                .with_metadata(json!({ "name": project.name })),
        )
        .await;

    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /projects/:id/tasks - Tasks of a project, newest first
pub async fn list_project_tasks(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<TaskRecord>>> {
    let store = services.store.as_ref();
    let project = tenant_project(store, &ctx, id_or_not_found(&id, PROJECT_NOT_FOUND)?).await?;
    require_project_access(store, &ctx, project.id).await?;

    let tasks = store.list_project_tasks(ctx.tenant_id(), project.id).await?;
    Ok(Json(tasks))
}

/// DELETE /projects/:id - Delete a project and everything under it
pub async fn delete_project(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> ApiResult<Json<OkResponse>> {
    let store = services.store.as_ref();
    let tenant_id = ctx.tenant_id();
    let project = tenant_project(store, &ctx, id_or_not_found(&id, PROJECT_NOT_FOUND)?).await?;

    // Children first. These are separate calls; a failure part-way leaves the rest in place.
    let tasks = store.delete_project_tasks(tenant_id, project.id).await?;
    store.delete_project_members(tenant_id, project.id).await?;
    store.delete_project_boards(tenant_id, project.id).await?;
    store.delete_project(tenant_id, project.id).await?;

    tracing::info!(%tenant_id, project_id = %project.id, tasks, "project deleted");
    services
        .audit
        .record_best_effort(
            AuditEntry::new(tenant_id, ctx.user_id(), "project.deleted", "project", project.id)
                .with_metadata(json!({ "name": project.name })),
        )
        .await;

    Ok(Json(OkResponse::ok()))
}

/// GET /projects/:id/members - Project members with their user details
pub async fn list_project_members(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ProjectMemberView>>> {
    let store = services.store.as_ref();
    let project = tenant_project(store, &ctx, id_or_not_found(&id, PROJECT_NOT_FOUND)?).await?;
    require_project_access(store, &ctx, project.id).await?;

    let members = store
        .list_project_members(ctx.tenant_id(), project.id)
        .await?
        .iter()
        .map(|(member, user)| ProjectMemberView::new(member, user))
        .collect();
    Ok(Json(members))
}

/// POST /projects/:id/members - Add (or re-role) a tenant member on the project
pub async fn add_project_member(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<AddProjectMemberRequest>,
) -> ApiResult<(StatusCode, Json<ProjectMemberRecord>)> {
    let store = services.store.as_ref();
    let tenant_id = ctx.tenant_id();
    let project = tenant_project(store, &ctx, id_or_not_found(&id, PROJECT_NOT_FOUND)?).await?;

    let user_id: UserId = body
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing userId"))?
        .parse()?;

    // Only members of this tenant can join its projects.
    if store.find_membership(tenant_id, user_id).await?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }

    let role = body.role.unwrap_or(Role::Member);
    let member = store
        .upsert_project_member(tenant_id, project.id, user_id, role)
        .await?;

    services
        .audit
        .record_best_effort(
            AuditEntry::new(tenant_id, ctx.user_id(), "project.member_added", "project", project.id)
                .with_metadata(json!({ "userId": user_id, "role": role })),
        )
        .await;

    Ok((StatusCode::CREATED, Json(member)))
}

/// DELETE /projects/:id/members/:user_id - Remove a user from the project
pub async fn remove_project_member(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: RequestContext,
    Path((id, user_id)): Path<(String, String)>,
) -> ApiResult<Json<OkResponse>> {
    let store = services.store.as_ref();
    let tenant_id = ctx.tenant_id();
    let project = tenant_project(store, &ctx, id_or_not_found(&id, PROJECT_NOT_FOUND)?).await?;

    // Removing someone who is not a member is a no-op, as is a malformed id.
    if let Ok(user_id) = user_id.parse::<UserId>() {
        let removed = store.remove_project_member(tenant_id, project.id, user_id).await?;
        if removed > 0 {
            services
                .audit
                .record_best_effort(
                    AuditEntry::new(tenant_id, ctx.user_id(), "project.member_removed", "project", project.id)
                        .with_metadata(json!({ "userId": user_id })),
                )
                .await;
        }
    }

    Ok(Json(OkResponse::ok()))
}
