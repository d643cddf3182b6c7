use axum::extract::{FromRequest, FromRequestParts, Json, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use validator::Validate;

use workboard_auth::{Role, TenantScoped};
use workboard_core::{TenantId, UserId};

use crate::app::errors::ApiError;

/// Request identity context for tenant-scoped handlers.
///
/// Wraps the [`TenantScoped`] proof the tenant gate left in the request
/// extensions. If it is missing the route was mounted outside the gates, and
/// the request is treated as unauthenticated.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RequestContext {
    scoped: TenantScoped,
}

impl RequestContext {
    pub fn tenant_id(&self) -> TenantId {
        self.scoped.tenant_id()
    }

    pub fn user_id(&self) -> UserId {
        self.scoped.user_id()
    }

    pub fn role(&self) -> Role {
        self.scoped.role()
    }

    /// OWNER and ADMIN see every project of the tenant.
    pub fn is_tenant_admin(&self) -> bool {
        self.scoped.role().is_tenant_admin()
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantScoped>()
            .copied()
            .map(|scoped| RequestContext { scoped })
            .ok_or(ApiError::Unauthenticated)
    }
}

/// JSON body that is deserialized and then checked with `validator`.
///
/// Both failure kinds become a 400 with the JSON error body.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::validation(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}
