//! In-process payment provider for development and tests.
//!
//! Fabricates gateway order ids locally and signs callbacks with the
//! configured merchant secret, so the full checkout sequence can run with no
//! network access. Verification is byte-for-byte the same code path the real
//! provider uses.

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use tracing::{debug, instrument};

use super::signature;
use super::{GatewayError, GatewayOrder, PaymentProvider};

pub struct MockProvider {
    secret: String,
}

impl MockProvider {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    /// Produce the callback triple a hosted payment page would hand back for
    /// a successful payment. Test and CLI helper.
    pub fn simulate_payment(&self, gateway_order_id: &str) -> (String, String) {
        let payment_id = format!("pay_{}", random_suffix(14));
        let sig = signature::sign(gateway_order_id, &payment_id, &self.secret);
        (payment_id, sig)
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
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

        let id = format!(
            "order_{}_{}",
            chrono::Utc::now().timestamp_millis(),
            random_suffix(8)
        );
        debug!(gateway_order_id = %id, amount, currency, "fabricated gateway order");

        Ok(GatewayOrder {
            id,
            amount,
            currency: currency.to_string(),
            receipt: receipt.to_string(),
        })
    }

    async fn verify_payment(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        presented: &str,
    ) -> bool {
        signature::verify(gateway_order_id, gateway_payment_id, presented, &self.secret)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

fn random_suffix(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
