//! Identity token issuance and verification (HS256 JWT).

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use thiserror::Error;

use crate::claims::{IdentityClaims, TokenValidationError, validate_claims};
use crate::Identity;

/// Validity window used when none is configured (7 days).
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token signature does not match")]
    BadSignature,

    #[error(transparent)]
    Window(#[from] TokenValidationError),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Stateless token service: no session store, no revocation list.
///
/// A token is valid iff its signature verifies and `now < exp`.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl core::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        let secret = secret.as_ref();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn with_default_ttl(secret: impl AsRef<[u8]>) -> Self {
        Self::new(secret, Duration::seconds(DEFAULT_TOKEN_TTL_SECS))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, identity: &Identity) -> Result<String, TokenError> {
        self.issue_at(identity, Utc::now())
    }

    /// Issue a token whose window starts at `now`.
    pub fn issue_at(&self, identity: &Identity, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = IdentityClaims::new(identity, now, now + self.ttl);
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<IdentityClaims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify signature and shape, then check expiry against `now`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<IdentityClaims, TokenError> {
        let data = decode::<IdentityClaims>(token, &self.decoding_key, &self.validation())
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed(e.to_string()),
            })?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }

    // Expiry is checked by `validate_claims` so callers can supply the clock.
    fn validation(&self) -> Validation {
        let mut v = Validation::new(Algorithm::HS256);
        v.validate_exp = false;
        v.leeway = 0;
        v
    }
}

#[cfg(test)]
mod tests {
    use workboard_core::{TenantId, UserId};

    use super::*;
    use crate::Role;

    fn identity(role: Role) -> Identity {
        Identity {
            user_id: UserId::new(),
            tenant_id: TenantId::new(),
            role,
        }
    }

    #[test]
    fn round_trip_until_expiry() {
        let svc = TokenService::with_default_ttl("test-secret");
        let id = identity(Role::Admin);
        let now = Utc::now();
        let token = svc.issue_at(&id, now).unwrap();

        let claims = svc.verify_at(&token, now).unwrap();
        assert_eq!(claims.identity(), Some(id));
        assert_eq!(claims.exp - claims.iat, DEFAULT_TOKEN_TTL_SECS);

        let ttl = Duration::seconds(DEFAULT_TOKEN_TTL_SECS);
        let almost = now + ttl - Duration::seconds(1);
        assert!(svc.verify_at(&token, almost).is_ok());

        let after = now + ttl + Duration::seconds(1);
        assert_eq!(
            svc.verify_at(&token, after),
            Err(TokenError::Window(TokenValidationError::Expired))
        );
    }

    #[test]
    fn lagging_verifier_clock_still_accepts() {
        let svc = TokenService::with_default_ttl("test-secret");
        let id = identity(Role::Member);
        let issued = Utc::now();
        let token = svc.issue_at(&id, issued).unwrap();

        let claims = svc.verify_at(&token, issued - Duration::seconds(2)).unwrap();
        assert_eq!(claims.identity(), Some(id));
    }

    #[test]
    fn foreign_secret_is_a_bad_signature() {
        let issuer = TokenService::with_default_ttl("secret-a");
        let verifier = TokenService::with_default_ttl("secret-b");
        let token = issuer.issue(&identity(Role::Owner)).unwrap();
        assert_eq!(verifier.verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn garbage_and_tampering_are_rejected() {
        let svc = TokenService::with_default_ttl("test-secret");
        assert!(matches!(svc.verify("not.a.jwt"), Err(TokenError::Malformed(_))));
        assert!(matches!(svc.verify(""), Err(TokenError::Malformed(_))));

        // Swap in the payload of another token signed with the same key.
        let other = svc.issue(&identity(Role::Owner)).unwrap();
        let other_payload = other.split('.').nth(1).unwrap();
        let token = svc.issue(&identity(Role::Viewer)).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = other_payload;
        let forged = parts.join(".");
        assert_eq!(svc.verify(&forged), Err(TokenError::BadSignature));
    }

    #[test]
    fn unknown_role_fails_decoding() {
        let secret = "test-secret";
        let now = Utc::now().timestamp();
        let claims = serde_json::json!({
            "userId": UserId::new(),
            "tenantId": TenantId::new(),
            "role": "SUPERUSER",
            "iat": now,
            "exp": now + 60,
        });
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        let svc = TokenService::with_default_ttl(secret);
        assert!(matches!(svc.verify(&token), Err(TokenError::Malformed(_))));
    }
}
