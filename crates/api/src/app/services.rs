use std::sync::Arc;

use chrono::Duration;
use thiserror::Error;

use workboard_auth::{PermissionTable, TokenService};
use workboard_infra::{
    AuditRecorder, BillingError, CheckoutProvider, Config, InMemoryStore, PostgresStore, Store, StoreError,
    StripeCheckout,
};

/// Failure while wiring services from configuration.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("storage: {0}")]
    Store(#[from] StoreError),

    #[error("billing: {0}")]
    Billing(#[from] BillingError),
}

/// Process-wide shared state handed to every handler.
///
/// Everything here is either immutable (permission table, token service) or
/// internally synchronized (store, audit recorder, billing client).
#[derive(Clone)]
pub struct AppServices {
    pub store: Arc<dyn Store>,
    pub tokens: Arc<TokenService>,
    pub permissions: Arc<PermissionTable>,
    pub audit: AuditRecorder,
    /// `None` when checkout is not configured.
    pub billing: Option<Arc<dyn CheckoutProvider>>,
}

impl std::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppServices")
            .field("tokens", &self.tokens)
            .field("billing_configured", &self.billing.is_some())
            .finish_non_exhaustive()
    }
}

impl AppServices {
    /// Wire services around a concrete store.
    pub fn new<S>(store: Arc<S>, tokens: TokenService, billing: Option<Arc<dyn CheckoutProvider>>) -> Self
    where
        S: Store + 'static,
    {
        Self {
            audit: AuditRecorder::new(store.clone()),
            store,
            tokens: Arc::new(tokens),
            permissions: Arc::new(PermissionTable::standard()),
            billing,
        }
    }

    /// In-memory store, default token lifetime, no billing.
    pub fn in_memory(jwt_secret: &str) -> Self {
        Self::new(
            Arc::new(InMemoryStore::new()),
            TokenService::with_default_ttl(jwt_secret),
            None,
        )
    }

    pub fn with_billing(mut self, provider: Arc<dyn CheckoutProvider>) -> Self {
        self.billing = Some(provider);
        self
    }

    pub async fn from_config(config: &Config) -> Result<Self, StartupError> {
        let tokens = TokenService::new(&config.jwt_secret, Duration::seconds(config.jwt_ttl_secs));
        let billing = match config.stripe.clone() {
            Some(stripe) => Some(Arc::new(StripeCheckout::new(stripe)?) as Arc<dyn CheckoutProvider>),
            None => None,
        };
        if billing.is_none() {
            tracing::info!("stripe not configured; checkout disabled");
        }

        match &config.database {
            Some(db) => {
                let store = PostgresStore::connect(&db.url, db.max_connections).await?;
                store.migrate().await?;
                tracing::info!("using postgres store");
                Ok(Self::new(Arc::new(store), tokens, billing))
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory store (data is lost on restart)");
                Ok(Self::new(Arc::new(InMemoryStore::new()), tokens, billing))
            }
        }
    }
}
