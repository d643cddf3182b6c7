use std::sync::Arc;

use axum::{extract::Extension, Json};
use serde_json::{json, Value};

use crate::app::dto::WhoamiResponse;
use crate::app::services::AppServices;
use crate::context::RequestContext;

pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// GET /whoami - The verified identity and what its role may do
pub async fn whoami(Extension(services): Extension<Arc<AppServices>>, ctx: RequestContext) -> Json<WhoamiResponse> {
    Json(WhoamiResponse {
        user_id: ctx.user_id(),
        tenant_id: ctx.tenant_id(),
        role: ctx.role(),
        permissions: services.permissions.permissions_for(ctx.role()),
    })
}
