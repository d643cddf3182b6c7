use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use workboard_core::{TenantId, UserId};

use crate::{Identity, Role};

/// Identity token payload.
///
/// The three identity fields plus the registered `iat`/`exp` claims. Only
/// `exp` takes part in validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityClaims {
    pub user_id: UserId,

    /// Always set by this service; optional on the wire so the tenant gate can
    /// reject tokens that lack it instead of failing decoding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,

    pub role: Role,

    /// Issued-at (Unix timestamp, seconds).
    pub iat: i64,

    /// Expiration (Unix timestamp, seconds).
    pub exp: i64,
}

impl IdentityClaims {
    pub fn new(identity: &Identity, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            user_id: identity.user_id,
            tenant_id: Some(identity.tenant_id),
            role: identity.role,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        }
    }

    /// The full identity, if the claims carry a usable tenant.
    pub fn identity(&self) -> Option<Identity> {
        let tenant_id = self.tenant_id.filter(|t| !t.is_nil())?;
        Some(Identity {
            user_id: self.user_id,
            tenant_id,
            role: self.role,
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,
}

/// Check expiry against `now`. `iat` is informational only, so a verifier
/// whose clock lags the issuer still accepts a fresh token.
///
/// Signature verification happens before this, in [`TokenService`](crate::TokenService).
pub fn validate_claims(claims: &IdentityClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if now.timestamp() >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
