//! Stripe Checkout over its form-encoded REST API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{BillingError, CheckoutProvider, CheckoutRequest, CheckoutSession};

pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripeConfig {
    pub secret_key: String,
    pub price_id: String,
    pub api_base: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Clone)]
pub struct StripeCheckout {
    client: reqwest::Client,
    config: StripeConfig,
}

impl std::fmt::Debug for StripeCheckout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeCheckout")
            .field("api_base", &self.config.api_base)
            .field("price_id", &self.config.price_id)
            .finish_non_exhaustive()
    }
}

impl StripeCheckout {
    pub fn new(config: StripeConfig) -> Result<Self, BillingError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BillingError::Client(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn form(&self, request: &CheckoutRequest) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("mode", "subscription".to_string()),
            ("line_items[0][price]", self.config.price_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", self.config.success_url.clone()),
            ("cancel_url", self.config.cancel_url.clone()),
            ("metadata[tenantId]", request.tenant_id.to_string()),
        ];
        if let Some(customer) = &request.customer_id {
            form.push(("customer", customer.clone()));
        }
        form
    }
}

#[async_trait]
impl CheckoutProvider for StripeCheckout {
    async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession, BillingError> {
        let url = format!("{}/v1/checkout/sessions", self.config.api_base.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.secret_key)
            .form(&self.form(&request))
            .send()
            .await
            .map_err(|e| BillingError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorEnvelope>()
                .await
                .ok()
                .and_then(|envelope| envelope.error.message)
                .unwrap_or_else(|| status.to_string());
            return Err(BillingError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| BillingError::Transport(format!("unreadable checkout session: {e}")))?;
        let url = session
            .url
            .ok_or_else(|| BillingError::Transport("checkout session has no url".to_string()))?;

        tracing::info!(tenant_id = %request.tenant_id, session_id = %session.id, "checkout session created");
        Ok(CheckoutSession { id: session.id, url })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use workboard_core::TenantId;

    use super::*;

    fn config(api_base: String) -> StripeConfig {
        StripeConfig {
            secret_key: "sk_test_123".to_string(),
            price_id: "price_abc".to_string(),
            api_base,
            success_url: "http://localhost:5173/billing/success".to_string(),
            cancel_url: "http://localhost:5173/billing/cancel".to_string(),
        }
    }

    #[tokio::test]
    async fn creates_subscription_session() {
        let server = MockServer::start().await;
        let tenant_id = TenantId::new();

        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(header("authorization", "Bearer sk_test_123"))
            .and(body_string_contains("mode=subscription"))
            .and(body_string_contains("price_abc"))
            .and(body_string_contains(tenant_id.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_1",
                "url": "https://checkout.stripe.com/c/pay/cs_test_1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = StripeCheckout::new(config(server.uri())).unwrap();
        let session = provider
            .create_checkout(CheckoutRequest {
                tenant_id,
                customer_id: None,
            })
            .await
            .unwrap();

        assert_eq!(session.id, "cs_test_1");
        assert_eq!(session.url, "https://checkout.stripe.com/c/pay/cs_test_1");
    }

    #[tokio::test]
    async fn passes_existing_customer() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(body_string_contains("customer=cus_42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_2",
                "url": "https://checkout.stripe.com/c/pay/cs_test_2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = StripeCheckout::new(config(server.uri())).unwrap();
        let session = provider
            .create_checkout(CheckoutRequest {
                tenant_id: TenantId::new(),
                customer_id: Some("cus_42".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(session.id, "cs_test_2");
    }

    #[tokio::test]
    async fn provider_error_is_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "message": "No such price: 'price_abc'" }
            })))
            .mount(&server)
            .await;

        let provider = StripeCheckout::new(config(server.uri())).unwrap();
        let err = provider
            .create_checkout(CheckoutRequest {
                tenant_id: TenantId::new(),
                customer_id: None,
            })
            .await
            .unwrap_err();

        assert_eq!(
            err,
            BillingError::Rejected {
                status: 400,
                message: "No such price: 'price_abc'".to_string()
            }
        );
    }

    #[test]
    fn construction_keeps_secret_out_of_debug() {
        let provider = StripeCheckout::new(config("http://localhost".to_string())).unwrap();
        let debug = format!("{provider:?}");
        assert!(debug.contains("price_abc"));
        assert!(!debug.contains("sk_test_123"));
    }

    #[tokio::test]
    async fn unreachable_provider_is_transport_error() {
        let provider = StripeCheckout::new(config("http://127.0.0.1:1".to_string())).unwrap();
        let err = provider
            .create_checkout(CheckoutRequest {
                tenant_id: TenantId::new(),
                customer_id: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::Transport(_)));
    }
}
