//! Billing checkout hand-off.
//!
//! The API only ever asks a provider for a hosted checkout URL; the provider
//! owns everything after that.

use async_trait::async_trait;
use thiserror::Error;

use workboard_core::TenantId;

pub mod stripe;

pub use stripe::{StripeCheckout, StripeConfig};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BillingError {
    /// The provider answered with a non-success status.
    #[error("provider rejected checkout ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The provider could not be reached or its answer was unreadable.
    #[error("provider unavailable: {0}")]
    Transport(String),

    /// The HTTP client for the provider could not be built.
    #[error("failed to build provider client: {0}")]
    Client(String),
}

/// Subscription checkout for one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub tenant_id: TenantId,
    /// Existing provider customer, if the tenant already has one.
    pub customer_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession, BillingError>;
}
