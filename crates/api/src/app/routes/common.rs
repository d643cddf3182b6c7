use std::str::FromStr;

use workboard_auth::{hash_password, verify_password};

use crate::app::errors::{ApiError, ApiResult};

/// Parse a path/body id; an unparseable id is reported like a missing row.
pub fn id_or_not_found<T: FromStr>(raw: &str, message: &'static str) -> ApiResult<T> {
    raw.trim().parse().map_err(|_| ApiError::not_found(message))
}

/// Hash on the blocking pool.
pub async fn hash_blocking(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("password hashing task failed: {e}")))?
        .map_err(|e| ApiError::Internal(e.to_string()))
}

pub async fn verify_blocking(password: String, hashed: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hashed))
        .await
        .map_err(|e| ApiError::Internal(format!("password verification task failed: {e}")))
}
