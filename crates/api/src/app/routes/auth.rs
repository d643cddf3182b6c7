//! Signup and login. These are the only routes outside the gates.

use std::sync::Arc;

use axum::{extract::Extension, routing::post, Json, Router};
use chrono::Utc;
use serde_json::json;

use workboard_auth::{DUMMY_PASSWORD_HASH, Identity, Role};
use workboard_core::{TenantId, UserId};
use workboard_infra::AuditEntry;
use workboard_infra::store::{StoreError, TenantRecord, UserRecord};

use crate::app::dto::{AuthResponse, LoginRequest, SignupRequest};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::common::{hash_blocking, verify_blocking};
use crate::app::services::AppServices;
use crate::context::ValidatedJson;

const EMAIL_IN_USE: &str = "Email already in use";
const SLUG_IN_USE: &str = "Tenant slug already in use";

pub fn router() -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}

/// POST /auth/signup - Create a tenant with its first (OWNER) user
pub async fn signup(
    Extension(services): Extension<Arc<AppServices>>,
    ValidatedJson(body): ValidatedJson<SignupRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let store = &services.store;

    if store.find_user_by_email(&body.email).await?.is_some() {
        return Err(ApiError::bad_request(EMAIL_IN_USE));
    }
    if store.find_tenant_by_slug(&body.tenant_slug).await?.is_some() {
        return Err(ApiError::bad_request(SLUG_IN_USE));
    }

    let password_hash = hash_blocking(body.password).await?;
    let now = Utc::now();

    // Independent calls, not one transaction: a failure part-way leaves the
    // earlier rows behind.
    let tenant = TenantRecord {
        id: TenantId::new(),
        name: body.tenant_name,
        slug: body.tenant_slug,
        created_at: now,
    };
    store.create_tenant(tenant.clone()).await.map_err(|e| match e {
        StoreError::Conflict(_) => ApiError::bad_request(SLUG_IN_USE),
        other => other.into(),
    })?;

    let user = UserRecord {
        id: UserId::new(),
        email: body.email,
        name: body.name,
        password_hash,
        created_at: now,
    };
    store.create_user(user.clone()).await.map_err(|e| match e {
        StoreError::Conflict(_) => ApiError::bad_request(EMAIL_IN_USE),
        other => other.into(),
    })?;

    store.upsert_membership(tenant.id, user.id, Role::Owner).await?;

    let identity = Identity {
        user_id: user.id,
        tenant_id: tenant.id,
        role: Role::Owner,
    };
    let token = services
        .tokens
        .issue(&identity)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    tracing::info!(tenant_id = %tenant.id, user_id = %user.id, "tenant created");
    services
        .audit
        .record_best_effort(
            AuditEntry::new(tenant.id, user.id, "tenant.created", "tenant", tenant.id)
                .with_metadata(json!({ "name": tenant.name, "slug": tenant.slug })),
        )
        .await;

    Ok(Json(AuthResponse {
        token,
        tenant_id: tenant.id,
        user_id: user.id,
        role: Role::Owner,
    }))
}

/// POST /auth/login - Issue a token for one tenant membership
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let store = &services.store;

    let tenant = store
        .find_tenant_by_slug(&body.tenant_slug)
        .await?
        .ok_or_else(|| ApiError::not_found("Tenant not found"))?;

    let Some(user) = store.find_user_by_email(&body.email).await? else {
        verify_blocking(body.password, DUMMY_PASSWORD_HASH.to_string()).await?;
        return Err(ApiError::InvalidCredentials);
    };

    if !verify_blocking(body.password, user.password_hash.clone()).await? {
        tracing::debug!(user_id = %user.id, "login with wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    let membership = store
        .find_membership(tenant.id, user.id)
        .await?
        .ok_or_else(|| ApiError::forbidden("No membership for tenant"))?;

    let identity = Identity {
        user_id: user.id,
        tenant_id: tenant.id,
        role: membership.role,
    };
    let token = services
        .tokens
        .issue(&identity)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(AuthResponse {
        token,
        tenant_id: tenant.id,
        user_id: user.id,
        role: membership.role,
    }))
}
