//! Read-only view of the role table, for debugging "why was this denied?".

use std::sync::Arc;

use axum::{extract::Extension, routing::get, Json, Router};
use serde_json::{json, Value};

use workboard_auth::Permission;

use crate::app::services::AppServices;
use crate::middleware::gated;

pub fn router() -> Router {
    Router::new().route("/roles", gated(get(list_roles), Permission::MemberInvite))
}

/// GET /admin/rbac/roles - List all roles and their permissions
pub async fn list_roles(Extension(services): Extension<Arc<AppServices>>) -> Json<Value> {
    Json(json!({ "roles": services.permissions.role_definitions() }))
}
