use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use thiserror::Error;
use validator::ValidationErrors;

use workboard_auth::GateError;
use workboard_core::DomainError;
use workboard_infra::{BillingError, StoreError};

/// The one message every 401 carries, whatever the underlying reason.
pub const UNAUTHENTICATED_MESSAGE: &str = "Missing or invalid credentials";

/// Handler-level error; every variant maps to one status and JSON body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed: {message}")]
    Validation { message: String, details: Option<Value> },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthenticated")]
    Unauthenticated,

    /// Login with an unknown email or a wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("missing tenant context")]
    MissingTenantContext,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("upstream failure: {0}")]
    BadGateway(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            // A unique-key conflict is reported as a bad request like the other input errors.
            ApiError::Validation { .. }
            | ApiError::BadRequest(_)
            | ApiError::Conflict(_)
            | ApiError::MissingTenantContext => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::Validation { message, details } => match details {
                Some(details) => json_error_with_details(status, "validation_error", message, details),
                None => json_error(status, "validation_error", message),
            },
            ApiError::BadRequest(message) => json_error(status, "bad_request", message),
            ApiError::Unauthenticated => json_error(status, "unauthenticated", UNAUTHENTICATED_MESSAGE),
            ApiError::InvalidCredentials => json_error(status, "invalid_credentials", "Invalid credentials"),
            ApiError::MissingTenantContext => {
                json_error(status, "missing_tenant_context", "Token carries no tenant")
            }
            ApiError::Forbidden(message) => json_error(status, "forbidden", message),
            ApiError::NotFound(message) => json_error(status, "not_found", message),
            ApiError::Conflict(message) => json_error(status, "conflict", message),
            ApiError::BadGateway(detail) => {
                tracing::error!(%detail, "upstream provider failed");
                json_error(status, "bad_gateway", "Upstream provider failed")
            }
            ApiError::Internal(detail) => {
                tracing::error!(%detail, "request failed");
                json_error(status, "internal_error", "Internal server error")
            }
        }
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Unauthenticated(reason) => {
                tracing::debug!(%reason, "authentication rejected");
                ApiError::Unauthenticated
            }
            GateError::MissingTenantContext => {
                tracing::debug!("tenant gate rejected token without tenant");
                ApiError::MissingTenantContext
            }
            GateError::Forbidden(permission) => {
                tracing::debug!(%permission, "permission gate rejected");
                ApiError::Forbidden(format!("Missing permission {permission}"))
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(message) => ApiError::Conflict(message),
            StoreError::NotFound(message) => ApiError::NotFound(message.to_string()),
            StoreError::Backend(message) => ApiError::Internal(message),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation {
            message: "Invalid request".to_string(),
            details: serde_json::to_value(&errors).ok(),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        ApiError::BadGateway(err.to_string())
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn json_error_with_details(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    details: Value,
) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
            "details": details,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use workboard_auth::{CredentialError, Permission};

    use super::*;

    #[test]
    fn gate_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(GateError::Unauthenticated(CredentialError::Missing)).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(GateError::MissingTenantContext).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(GateError::Forbidden(Permission::BillingManage)).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn store_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(StoreError::Conflict("dup".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(StoreError::NotFound("Task not found")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(StoreError::Backend("down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn malformed_ids_are_validation_errors() {
        let err = ApiError::from(DomainError::invalid_id("UserId", "nope"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(matches!(err, ApiError::Validation { message, .. } if message.contains("UserId 'nope'")));
    }

    #[test]
    fn billing_errors_are_bad_gateway() {
        let err = ApiError::from(BillingError::Transport("timeout".into()));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }
}
