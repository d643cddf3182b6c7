//! `workboard-auth`: pure authentication/authorization boundary.
//!
//! Credentials, identity tokens, the role → permission table and the typed
//! gate chain. This crate is intentionally decoupled from HTTP and storage.

pub mod authorize;
pub mod claims;
pub mod gate;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod token;

pub use authorize::{AuthzError, PermissionTable, RoleDefinition, authorize};
pub use claims::{IdentityClaims, TokenValidationError, validate_claims};
pub use gate::{CredentialError, GateError, authenticate, authenticate_at, extract_bearer};
pub use password::{DUMMY_PASSWORD_HASH, PasswordHashError, hash_password, verify_password};
pub use permissions::{Permission, UnknownPermission};
pub use principal::{Authenticated, Identity, TenantScoped};
pub use roles::{Role, UnknownRole};
pub use token::{DEFAULT_TOKEN_TTL_SECS, TokenError, TokenService};
