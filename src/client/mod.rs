//! Typed HTTP client for the storefront API.
//!
//! Drives the same endpoints a browser storefront would: catalog reads,
//! order placement with the totals the buyer saw, gateway order creation
//! and payment verification. The checkout CLI builds on this; tests use
//! it as a reference for the wire shapes.

use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::{
    entities::order::{PaymentMethod, ShippingMethod},
    errors::ErrorResponse,
    pricing,
    services::{
        agents::AgentResponse,
        catalog::ProductResponse,
        checkout::{
            GatewayOrderResponse, OrderItemRequest, PlaceOrderRequest, PlaceOrderResponse,
            VerifyPaymentRequest, VerifyPaymentResponse,
        },
        orders::{OrderListResponse, OrderResponse, ShippingAddress},
    },
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with an error body.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("{0}")]
    Cart(String),
}

/// Buyer-side cart state. Lines merge by product; totals are computed
/// with the same pricing rules the server enforces so a submission from
/// an unmodified client always passes the server's totals check.
#[derive(Debug, Default, Clone)]
pub struct Cart {
    lines: Vec<OrderItemRequest>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, product_id: Uuid, quantity: i32) {
        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|line| line.product_id == product_id)
        {
            line.quantity += quantity;
        } else {
            self.lines.push(OrderItemRequest {
                product_id,
                quantity,
            });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[OrderItemRequest] {
        &self.lines
    }

    /// Empties the cart. Called after a successful checkout; a failed
    /// payment leaves the cart intact so the buyer can retry.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Assembles the checkout payload, pricing the cart from the given
    /// catalog prices exactly the way the server will.
    pub fn build_order_request(
        &self,
        unit_prices: &HashMap<Uuid, i64>,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
        shipping_method: ShippingMethod,
        agent_id: Option<Uuid>,
    ) -> Result<PlaceOrderRequest, ClientError> {
        if self.lines.is_empty() {
            return Err(ClientError::Cart("the cart is empty".to_string()));
        }

        let mut subtotal: i64 = 0;
        for line in &self.lines {
            let unit_price = unit_prices.get(&line.product_id).ok_or_else(|| {
                ClientError::Cart(format!("no catalog price for product {}", line.product_id))
            })?;
            subtotal += i64::from(line.quantity) * unit_price;
        }
        let totals = pricing::price_order(subtotal, shipping_method);

        Ok(PlaceOrderRequest {
            items: self.lines.clone(),
            subtotal: totals.subtotal,
            discount: totals.discount,
            tax: totals.tax,
            shipping: totals.shipping,
            total: totals.total,
            shipping_address,
            payment_method,
            shipping_method,
            agent_id,
        })
    }
}

/// HTTP client bound to one buyer's bearer token.
pub struct StorefrontClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl StorefrontClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub async fn list_products(&self) -> Result<Vec<ProductResponse>, ClientError> {
        let response = self
            .http
            .get(format!("{}/api/v1/products", self.base_url))
            .send()
            .await?;
        decode(response).await
    }

    pub async fn list_agents(&self) -> Result<Vec<AgentResponse>, ClientError> {
        let response = self
            .http
            .get(format!("{}/api/v1/agents", self.base_url))
            .send()
            .await?;
        decode(response).await
    }

    pub async fn place_order(
        &self,
        request: &PlaceOrderRequest,
    ) -> Result<PlaceOrderResponse, ClientError> {
        let response = self
            .http
            .post(format!("{}/api/v1/checkout/orders", self.base_url))
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn create_gateway_order(
        &self,
        order_id: Uuid,
    ) -> Result<GatewayOrderResponse, ClientError> {
        let response = self
            .http
            .post(format!(
                "{}/api/v1/checkout/orders/{}/gateway-order",
                self.base_url, order_id
            ))
            .bearer_auth(&self.token)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn verify_payment(
        &self,
        request: &VerifyPaymentRequest,
    ) -> Result<VerifyPaymentResponse, ClientError> {
        let response = self
            .http
            .post(format!("{}/api/v1/checkout/payments/verify", self.base_url))
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderResponse, ClientError> {
        let response = self
            .http
            .get(format!("{}/api/v1/orders/{}", self.base_url, order_id))
            .bearer_auth(&self.token)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ClientError> {
        let response = self
            .http
            .get(format!("{}/api/v1/orders", self.base_url))
            .query(&[("page", page), ("per_page", per_page)])
            .bearer_auth(&self.token)
            .send()
            .await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let message = match response.json::<ErrorResponse>().await {
        Ok(body) => body.message,
        Err(_) => format!("unparseable error body (HTTP {})", status),
    };
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
