use std::sync::Arc;

use axum::{extract::Extension, routing::post, Json, Router};

use workboard_auth::Permission;
use workboard_infra::CheckoutRequest;

use crate::app::dto::CheckoutResponse;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::context::RequestContext;
use crate::middleware::gated;

pub fn router() -> Router {
    Router::new().route("/checkout", gated(post(checkout), Permission::BillingManage))
}

/// POST /billing/checkout - Hosted subscription checkout URL for the tenant
pub async fn checkout(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: RequestContext,
) -> ApiResult<Json<CheckoutResponse>> {
    let Some(provider) = services.billing.clone() else {
        return Err(ApiError::bad_request("Stripe not configured"));
    };

    let customer_id = services
        .store
        .find_billing_account(ctx.tenant_id())
        .await?
        .and_then(|account| account.stripe_customer_id);

    let session = provider
        .create_checkout(CheckoutRequest {
            tenant_id: ctx.tenant_id(),
            customer_id,
        })
        .await?;

    Ok(Json(CheckoutResponse { url: session.url }))
}
