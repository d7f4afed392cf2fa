//! Hosted Razorpay adapter.
//!
//! Order creation calls the REST API with basic auth. Callback verification
//! is purely local: Razorpay signs `"<order_id>|<payment_id>"` with the
//! merchant key secret, which is the same scheme the signature module
//! implements, so no network round trip is needed to verify.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};

use super::signature;
use super::{GatewayError, GatewayOrder, PaymentProvider};

pub struct RazorpayProvider {
    client: reqwest::Client,
    endpoint: String,
    key_id: String,
    key_secret: String,
}

#[derive(Debug, Deserialize)]
struct RazorpayOrderResponse {
    id: String,
    amount: i64,
    currency: String,
    receipt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RazorpayErrorBody {
    error: Option<RazorpayErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct RazorpayErrorDetail {
    code: Option<String>,
    description: Option<String>,
}

impl RazorpayProvider {
    pub fn new(endpoint: String, key_id: String, key_secret: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            key_id,
            key_secret,
        }
    }
}

#[async_trait]
impl PaymentProvider for RazorpayProvider {
    #[instrument(skip(self))]
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, GatewayError> {
        if amount < 1 {
            return Err(GatewayError::InvalidAmount(format!(
                "amount must be at least 1 minor unit, got {}",
                amount
            )));
        }

        let url = format!("{}/v1/orders", self.endpoint);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&json!({
                "amount": amount,
                "currency": currency,
                "receipt": receipt,
            }))
            .send()
            .await
            .map_err(|e| {
                warn!("gateway order creation request failed: {}", e);
                GatewayError::Unavailable(format!("request failed: {}", e))
            })?;

        let status = response.status();
        if status.is_success() {
            let order: RazorpayOrderResponse = response.json().await.map_err(|e| {
                GatewayError::Protocol(format!("malformed order response: {}", e))
            })?;
            debug!(gateway_order_id = %order.id, amount, "gateway order created");
            return Ok(GatewayOrder {
                id: order.id,
                amount: order.amount,
                currency: order.currency,
                receipt: order.receipt.unwrap_or_else(|| receipt.to_string()),
            });
        }

        let body: RazorpayErrorBody = response.json().await.unwrap_or(RazorpayErrorBody {
            error: None,
        });
        let description = body
            .error
            .as_ref()
            .and_then(|e| e.description.clone())
            .unwrap_or_else(|| format!("gateway returned HTTP {}", status));
        let code = body.error.and_then(|e| e.code).unwrap_or_default();

        if status == reqwest::StatusCode::BAD_REQUEST && code == "BAD_REQUEST_ERROR" {
            Err(GatewayError::InvalidAmount(description))
        } else {
            warn!(%status, "gateway rejected order creation: {}", description);
            Err(GatewayError::Unavailable(description))
        }
    }

    async fn verify_payment(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        presented: &str,
    ) -> bool {
        signature::verify(
            gateway_order_id,
            gateway_payment_id,
            presented,
            &self.key_secret,
        )
    }

    fn name(&self) -> &'static str {
        "razorpay"
    }
}
