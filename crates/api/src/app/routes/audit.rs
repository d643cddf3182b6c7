use std::sync::Arc;

use axum::{extract::Extension, routing::get, Json, Router};

use workboard_auth::Permission;
use workboard_infra::store::AuditRecord;

use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::RequestContext;
use crate::middleware::gated;

const AUDIT_PAGE: usize = 200;

pub fn router() -> Router {
    Router::new().route("/", gated(get(list_audit), Permission::AuditRead))
}

/// GET /audit - Latest audit entries of the tenant, newest first
pub async fn list_audit(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: RequestContext,
) -> ApiResult<Json<Vec<AuditRecord>>> {
    let entries = services.store.list_audit(ctx.tenant_id(), AUDIT_PAGE).await?;
    Ok(Json(entries))
}
