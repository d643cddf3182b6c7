//! The three request gates as axum middleware.
//!
//! `authentication_gate` and `tenant_gate` wrap every protected route;
//! `permission_gate` is bound per route with [`gated`].

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::MethodRouter,
};

use workboard_auth::{Authenticated, Permission, TenantScoped, TokenService, authenticate};

use crate::app::errors::ApiError;
use crate::app::services::AppServices;

#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<TokenService>,
}

/// Verifies the bearer token and attaches [`Authenticated`] to the request.
pub async fn authentication_gate(State(state): State<AuthState>, mut req: Request, next: Next) -> Response {
    // A header that is not valid UTF-8 counts as missing.
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match authenticate(&state.tokens, header) {
        Ok(authenticated) => {
            req.extensions_mut().insert(authenticated);
            next.run(req).await
        }
        Err(err) => ApiError::from(err).into_response(),
    }
}

/// Turns [`Authenticated`] into [`TenantScoped`], rejecting tokens without a tenant.
pub async fn tenant_gate(mut req: Request, next: Next) -> Response {
    let Some(authenticated) = req.extensions_mut().remove::<Authenticated>() else {
        return ApiError::Unauthenticated.into_response();
    };

    match authenticated.require_tenant() {
        Ok(scoped) => {
            req.extensions_mut().insert(scoped);
            next.run(req).await
        }
        Err(err) => ApiError::from(err).into_response(),
    }
}

/// Checks the permission bound at route registration against the caller's role.
pub async fn permission_gate(State(permission): State<Permission>, req: Request, next: Next) -> Response {
    let Some(scoped) = req.extensions().get::<TenantScoped>().copied() else {
        return ApiError::Unauthenticated.into_response();
    };
    let Some(services) = req.extensions().get::<Arc<AppServices>>().cloned() else {
        return ApiError::Internal("services extension missing".to_string()).into_response();
    };

    match scoped.require(&services.permissions, permission) {
        Ok(()) => next.run(req).await,
        Err(err) => ApiError::from(err).into_response(),
    }
}

/// Guard a method router with a permission.
pub fn gated(route: MethodRouter, permission: Permission) -> MethodRouter {
    route.route_layer(middleware::from_fn_with_state(permission, permission_gate))
}
