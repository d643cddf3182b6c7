//! Infrastructure layer: config, persistence, audit trail, external services.

pub mod audit;
pub mod billing;
pub mod config;
pub mod store;

pub use audit::{AuditEntry, AuditRecorder};
pub use billing::{BillingError, CheckoutProvider, CheckoutRequest, CheckoutSession, StripeCheckout, StripeConfig};
pub use config::{Config, ConfigError, DatabaseConfig};
pub use store::{InMemoryStore, PostgresStore, Store, StoreError, StoreResult};
