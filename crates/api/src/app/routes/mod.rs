use axum::{routing::get, Router};

pub mod admin;
pub mod audit;
pub mod auth;
pub mod billing;
pub mod common;
pub mod projects;
pub mod rbac;
pub mod system;
pub mod tasks;

/// Routes reachable without a token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest("/auth", auth::router())
}

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/projects", projects::router())
        .nest("/tasks", tasks::router())
        .nest("/audit", audit::router())
        .nest("/billing", billing::router())
        .nest("/admin", admin::router())
}
