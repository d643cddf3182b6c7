//! Tenant administration: members, invites, tenant overview.
//!
//! Everything here requires `member:invite`.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use workboard_auth::{Permission, Role};
use workboard_core::UserId;
use workboard_infra::AuditEntry;
use workboard_infra::store::UserRecord;

use crate::app::dto::{InviteRequest, MemberView, TenantOverview};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::{common::hash_blocking, rbac};
use crate::app::services::AppServices;
use crate::context::{RequestContext, ValidatedJson};
use crate::middleware::gated;

pub fn router() -> Router {
    Router::new()
        .route("/members", gated(get(list_members), Permission::MemberInvite))
        .route("/tenant", gated(get(tenant_overview), Permission::MemberInvite))
        .route("/invite", gated(post(invite_member), Permission::MemberInvite))
        .nest("/rbac", rbac::router())
}

/// GET /admin/members - Tenant members with their user details
pub async fn list_members(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: RequestContext,
) -> ApiResult<Json<Vec<MemberView>>> {
    let members = services
        .store
        .list_memberships(ctx.tenant_id())
        .await?
        .iter()
        .map(|(membership, user)| MemberView::listed(membership, user))
        .collect();
    Ok(Json(members))
}

/// GET /admin/tenant - Tenant details with member/project/task counts
pub async fn tenant_overview(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: RequestContext,
) -> ApiResult<Json<TenantOverview>> {
    let tenant = services
        .store
        .find_tenant(ctx.tenant_id())
        .await?
        .ok_or_else(|| ApiError::not_found("Tenant not found"))?;
    let stats = services.store.tenant_stats(ctx.tenant_id()).await?;
    Ok(Json(TenantOverview::new(tenant, stats)))
}

/// POST /admin/invite - Add a user to the tenant (creating the user if needed)
pub async fn invite_member(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: RequestContext,
    ValidatedJson(body): ValidatedJson<InviteRequest>,
) -> ApiResult<(StatusCode, Json<MemberView>)> {
    if body.role == Role::Owner {
        return Err(ApiError::validation("role must be one of ADMIN, MEMBER, VIEWER"));
    }
    let store = &services.store;
    let tenant_id = ctx.tenant_id();

    // An existing account keeps its name and password; the invite only grants access.
    let user = match store.find_user_by_email(&body.email).await? {
        Some(user) => user,
        None => {
            let user = UserRecord {
                id: UserId::new(),
                email: body.email,
                name: body.name,
                password_hash: hash_blocking(body.password).await?,
                created_at: Utc::now(),
            };
            store.create_user(user.clone()).await?;
            user
        }
    };

    if let Some(existing) = store.find_membership(tenant_id, user.id).await? {
        if existing.role == Role::Owner {
            return Err(ApiError::forbidden("The tenant owner's role cannot be changed"));
        }
    }

    let membership = store.upsert_membership(tenant_id, user.id, body.role).await?;

    tracing::info!(%tenant_id, user_id = %user.id, role = %membership.role, "member invited");
    services
        .audit
        .record_best_effort(
            AuditEntry::new(tenant_id, ctx.user_id(), "member.invited", "membership", membership.id)
                .with_metadata(json!({ "userId": user.id, "email": user.email, "role": membership.role })),
        )
        .await;

    Ok((StatusCode::CREATED, Json(MemberView::invited(&membership, &user))))
}
