use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{delete, patch, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use workboard_auth::Permission;
use workboard_core::{BoardId, TaskId, TaskStatus, TenantId, UserId};
use workboard_infra::AuditEntry;
use workboard_infra::store::{Store, TASK_NOT_FOUND, TaskRecord};

use crate::app::dto::{CreateTaskRequest, OkResponse, UpdateTaskRequest, parse_due_date};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::common::id_or_not_found;
use crate::app::services::AppServices;
use crate::authz::require_project_access;
use crate::context::{RequestContext, ValidatedJson};
use crate::middleware::gated;

const BOARD_NOT_FOUND: &str = "Board not found";

pub fn router() -> Router {
    Router::new()
        .route("/", gated(post(create_task), Permission::TaskCreate))
        .route(
            "/:id",
            gated(patch(update_task), Permission::TaskUpdate).merge(gated(delete(delete_task), Permission::TaskDelete)),
        )
}

/// The assignee must be a member of the caller's tenant.
async fn tenant_assignee(store: &dyn Store, tenant_id: TenantId, raw: &str) -> ApiResult<UserId> {
    let user_id: UserId = raw.parse()?;
    match store.find_membership(tenant_id, user_id).await? {
        Some(_) => Ok(user_id),
        None => Err(ApiError::bad_request("Assignee is not a member of this tenant")),
    }
}

async fn tenant_task(store: &dyn Store, ctx: &RequestContext, id: &str) -> ApiResult<TaskRecord> {
    let task_id: TaskId = id_or_not_found(id, TASK_NOT_FOUND)?;
    store
        .find_task(ctx.tenant_id(), task_id)
        .await?
        .ok_or_else(|| ApiError::not_found(TASK_NOT_FOUND))
}

/// POST /tasks - Create a task on a board of the caller's tenant
pub async fn create_task(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: RequestContext,
    ValidatedJson(body): ValidatedJson<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskRecord>)> {
    let store = services.store.as_ref();
    let tenant_id = ctx.tenant_id();

    // Boards of other tenants are indistinguishable from missing ones.
    let board_id: BoardId = id_or_not_found(&body.board_id, BOARD_NOT_FOUND)?;
    let board = store
        .find_board(tenant_id, board_id)
        .await?
        .ok_or_else(|| ApiError::not_found(BOARD_NOT_FOUND))?;
    require_project_access(store, &ctx, board.project_id).await?;

    let assignee_id = match body.assignee_id.as_deref() {
        Some(raw) => Some(tenant_assignee(store, tenant_id, raw).await?),
        None => None,
    };
    let due_date = body.due_date.as_deref().map(parse_due_date).transpose()?;

    let now = Utc::now();
    let task = TaskRecord {
        id: TaskId::new(),
        tenant_id,
        project_id: board.project_id,
        board_id: board.id,
        title: body.title,
        description: body.description,
        status: TaskStatus::Todo,
        assignee_id,
        created_by_id: ctx.user_id(),
        due_date,
        created_at: now,
        updated_at: now,
    };
    store.create_task(task.clone()).await?;

    tracing::info!(%tenant_id, task_id = %task.id, "task created");
    services
        .audit
        .record_best_effort(
            AuditEntry::new(tenant_id, ctx.user_id(), "task.created", "task", task.id)
                .with_metadata(json!({ "title": task.title })),
        )
        .await;

    Ok((StatusCode::CREATED, Json(task)))
}

/// PATCH /tasks/:id - Partial update; `null` clears assignee or due date
pub async fn update_task(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<UpdateTaskRequest>,
) -> ApiResult<Json<TaskRecord>> {
    let store = services.store.as_ref();
    let tenant_id = ctx.tenant_id();
    let mut task = tenant_task(store, &ctx, &id).await?;
    require_project_access(store, &ctx, task.project_id).await?;

    if let Some(status) = body.status {
        task.status = status;
    }
    if let Some(title) = body.title {
        task.title = title;
    }
    if let Some(description) = body.description {
        task.description = Some(description);
    }
    match body.assignee_id {
        Some(Some(raw)) => task.assignee_id = Some(tenant_assignee(store, tenant_id, &raw).await?),
        Some(None) => task.assignee_id = None,
        None => {}
    }
    match body.due_date {
        Some(Some(raw)) => task.due_date = Some(parse_due_date(&raw)?),
        Some(None) => task.due_date = None,
        None => {}
    }
    task.updated_at = Utc::now();

    store.update_task(&task).await?;

    services
        .audit
        .record_best_effort(
            AuditEntry::new(tenant_id, ctx.user_id(), "task.updated", "task", task.id)
                .with_metadata(json!({ "status": task.status })),
        )
        .await;

    Ok(Json(task))
}

/// DELETE /tasks/:id
pub async fn delete_task(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> ApiResult<Json<OkResponse>> {
    let store = services.store.as_ref();
    let task = tenant_task(store, &ctx, &id).await?;

    store.delete_task(ctx.tenant_id(), task.id).await?;

    services
        .audit
        .record_best_effort(
            AuditEntry::new(ctx.tenant_id(), ctx.user_id(), "task.deleted", "task", task.id)
                .with_metadata(json!({ "title": task.title })),
        )
        .await;

    Ok(Json(OkResponse::ok()))
}
