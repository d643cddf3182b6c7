//! Request gates, in the only order they can run:
//! `authenticate` → [`Authenticated::require_tenant`] → [`TenantScoped::require`].
//!
//! Each step consumes or borrows the proof produced by the previous one, so a
//! permission check without a verified, tenant-bound identity does not type-check.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{Authenticated, Permission, PermissionTable, TenantScoped, TokenError, TokenService};

/// Why a request was rejected before reaching its handler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    /// Missing, malformed, or unverifiable credential. The reason is for logs
    /// only; callers all see the same outcome.
    #[error("unauthenticated: {0}")]
    Unauthenticated(CredentialError),

    #[error("missing tenant context")]
    MissingTenantContext,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(Permission),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("no authorization header")]
    Missing,

    #[error("authorization header is not a bearer credential")]
    NotBearer,

    #[error(transparent)]
    Invalid(#[from] TokenError),
}

impl From<CredentialError> for GateError {
    fn from(value: CredentialError) -> Self {
        GateError::Unauthenticated(value)
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
///
/// The scheme name is case-insensitive (RFC 7235).
pub fn extract_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim_start().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Authentication gate.
pub fn authenticate(tokens: &TokenService, authorization: Option<&str>) -> Result<Authenticated, GateError> {
    authenticate_at(tokens, authorization, Utc::now())
}

pub fn authenticate_at(
    tokens: &TokenService,
    authorization: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Authenticated, GateError> {
    let header = authorization.ok_or(CredentialError::Missing)?;
    let token = extract_bearer(header).ok_or(CredentialError::NotBearer)?;
    let claims = tokens
        .verify_at(token, now)
        .map_err(CredentialError::Invalid)?;

    Ok(Authenticated::new(claims.user_id, claims.tenant_id, claims.role))
}

impl Authenticated {
    /// Tenant gate. Every token this service issues carries a tenant, so a
    /// failure here means the token came from somewhere else.
    pub fn require_tenant(self) -> Result<TenantScoped, GateError> {
        match self.tenant_id() {
            Some(tenant_id) if !tenant_id.is_nil() => Ok(TenantScoped::new(crate::Identity {
                user_id: self.user_id(),
                tenant_id,
                role: self.role(),
            })),
            _ => Err(GateError::MissingTenantContext),
        }
    }
}

impl TenantScoped {
    /// Permission gate.
    pub fn require(&self, table: &PermissionTable, permission: Permission) -> Result<(), GateError> {
        crate::authorize(table, self.role(), permission).map_err(|_| GateError::Forbidden(permission))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
    use workboard_core::{TenantId, UserId};

    use super::*;
    use crate::{Identity, Role};

    const SECRET: &str = "gate-secret";

    fn token_for(role: Role) -> (Identity, String) {
        let svc = TokenService::with_default_ttl(SECRET);
        let identity = Identity {
            user_id: UserId::new(),
            tenant_id: TenantId::new(),
            role,
        };
        let token = svc.issue(&identity).unwrap();
        (identity, token)
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(extract_bearer("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer("Bearer   abc  "), Some("abc"));
        assert_eq!(extract_bearer("bearer abc"), Some("abc"));
        assert_eq!(extract_bearer("BEARER abc"), Some("abc"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("Bearerabc"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
        assert_eq!(extract_bearer("abc"), None);
    }

    #[test]
    fn full_chain_passes_for_granted_permission() {
        let svc = TokenService::with_default_ttl(SECRET);
        let table = PermissionTable::standard();
        let (identity, token) = token_for(Role::Member);

        let header = format!("Bearer {token}");
        let scoped = authenticate(&svc, Some(&header))
            .unwrap()
            .require_tenant()
            .unwrap();

        assert_eq!(scoped.identity(), &identity);
        assert_eq!(scoped.require(&table, Permission::TaskUpdate), Ok(()));
        assert_eq!(
            scoped.require(&table, Permission::ProjectDelete),
            Err(GateError::Forbidden(Permission::ProjectDelete))
        );
    }

    #[test]
    fn missing_and_invalid_credentials_are_unauthenticated() {
        let svc = TokenService::with_default_ttl(SECRET);

        assert_eq!(
            authenticate(&svc, None),
            Err(GateError::Unauthenticated(CredentialError::Missing))
        );
        assert_eq!(
            authenticate(&svc, Some("Token abc")),
            Err(GateError::Unauthenticated(CredentialError::NotBearer))
        );
        assert!(matches!(
            authenticate(&svc, Some("Bearer abc.def.ghi")),
            Err(GateError::Unauthenticated(CredentialError::Invalid(_)))
        ));
    }

    #[test]
    fn expired_token_is_unauthenticated() {
        let svc = TokenService::with_default_ttl(SECRET);
        let (_, token) = token_for(Role::Owner);
        let later = Utc::now() + Duration::days(8);
        assert!(matches!(
            authenticate_at(&svc, Some(&format!("Bearer {token}")), later),
            Err(GateError::Unauthenticated(CredentialError::Invalid(_)))
        ));
    }

    #[test]
    fn token_without_tenant_fails_tenant_gate() {
        let now = Utc::now().timestamp();
        let claims = serde_json::json!({
            "userId": UserId::new(),
            "role": "OWNER",
            "iat": now,
            "exp": now + 600,
        });
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let svc = TokenService::with_default_ttl(SECRET);
        let authenticated = authenticate(&svc, Some(&format!("Bearer {token}"))).unwrap();
        assert_eq!(authenticated.role(), Role::Owner);
        assert_eq!(authenticated.require_tenant(), Err(GateError::MissingTenantContext));
    }
}
