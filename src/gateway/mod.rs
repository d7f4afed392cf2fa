/*!
 * # Payment Gateway Integration
 *
 * This module abstracts the online payment provider behind a trait so the
 * checkout flow can run against the hosted Razorpay API in production and an
 * in-process mock during development and tests.
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::ServiceError;

pub mod mock;
pub mod razorpay;
pub mod signature;

/// Gateway errors
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),
    #[error("Gateway protocol error: {0}")]
    Protocol(String),
}

impl From<GatewayError> for ServiceError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidAmount(msg) => ServiceError::ValidationError(msg),
            GatewayError::Unavailable(msg) => ServiceError::GatewayUnavailable(msg),
            GatewayError::Protocol(msg) => ServiceError::GatewayUnavailable(msg),
        }
    }
}

/// Provider-side order opened ahead of a hosted payment attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    /// Provider-assigned id, referenced by the later payment callback
    pub id: String,
    /// Amount in minor currency units, echoed back by the provider
    pub amount: i64,
    pub currency: String,
    /// Merchant reference, our order number
    pub receipt: String,
}

/// Payment provider abstraction.
///
/// `create_order` talks to the provider and may fail; `verify_payment` checks
/// a payment callback's authenticity and reports mismatches as `false` rather
/// than as errors, so callers can record the failed verification.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Open a provider-side order for `amount` minor units. The amount and
    /// currency given here are authoritative; callbacks carry no amount.
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, GatewayError>;

    /// Check that `signature` authenticates the `(gateway_order_id,
    /// gateway_payment_id)` pair. A forged or corrupted signature is a
    /// regular `false`, not an error.
    async fn verify_payment(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> bool;

    fn name(&self) -> &'static str;
}
