use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    entities::order::{OrderStatus, PaymentMethod, ShippingMethod},
    errors::ServiceError,
    gateway::PaymentProvider,
    pricing::{self, Totals},
    services::{
        agents::AgentService,
        catalog::{CatalogService, RequestedLine},
        orders::{OrderDraft, OrderService, ShippingAddress},
    },
};

/// One cart line as submitted at checkout. Quantity is the only thing the
/// client decides; the catalog prices it.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 10000, message = "Quantity must be between 1 and 10000"))]
    pub quantity: i32,
}

/// Checkout submission. The totals are the figures the buyer saw; the
/// server reprices the cart and rejects the order if they disagree.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct PlaceOrderRequest {
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<OrderItemRequest>,
    pub subtotal: i64,
    pub discount: i64,
    pub tax: i64,
    pub shipping: i64,
    pub total: i64,
    #[validate]
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub shipping_method: ShippingMethod,
    pub agent_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PlaceOrderResponse {
    pub order_id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GatewayOrderResponse {
    pub gateway_order_id: String,
    /// Minor currency units, always the order's stored total
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct VerifyPaymentRequest {
    pub order_id: Uuid,
    #[validate(length(min = 1, message = "gateway_order_id is required"))]
    pub gateway_order_id: String,
    #[validate(length(min = 1, message = "gateway_payment_id is required"))]
    pub gateway_payment_id: String,
    #[validate(length(min = 1, message = "signature is required"))]
    pub signature: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Success,
    Failed,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyPaymentResponse {
    pub status: VerificationStatus,
    pub order_status: OrderStatus,
}

/// Checkout orchestrator. This is the only code that drives order status
/// transitions: it reprices carts, talks to the payment provider, and maps
/// verification outcomes onto the store's guarded transitions.
#[derive(Clone)]
pub struct CheckoutService {
    order_service: Arc<OrderService>,
    catalog_service: Arc<CatalogService>,
    agent_service: Arc<AgentService>,
    payment_provider: Arc<dyn PaymentProvider>,
    currency: String,
}

impl CheckoutService {
    pub fn new(
        order_service: Arc<OrderService>,
        catalog_service: Arc<CatalogService>,
        agent_service: Arc<AgentService>,
        payment_provider: Arc<dyn PaymentProvider>,
        currency: String,
    ) -> Self {
        Self {
            order_service,
            catalog_service,
            agent_service,
            payment_provider,
            currency,
        }
    }

    /// Places an order for the authenticated buyer.
    ///
    /// The cart is repriced from the catalog and the submitted totals must
    /// match the server's own arithmetic exactly. Cash-on-delivery orders
    /// are confirmed immediately; online orders stay PENDING until their
    /// payment verifies.
    #[instrument(skip(self, request), fields(user_id = %user.user_id))]
    pub async fn place_order(
        &self,
        user: &AuthUser,
        request: PlaceOrderRequest,
    ) -> Result<PlaceOrderResponse, ServiceError> {
        request.validate()?;
        for item in &request.items {
            item.validate()?;
        }

        let lines: Vec<RequestedLine> = request
            .items
            .iter()
            .map(|item| RequestedLine {
                product_id: item.product_id,
                quantity: item.quantity,
            })
            .collect();
        let priced_items = self.catalog_service.price_lines(&lines).await?;

        let subtotal = priced_items
            .iter()
            .map(|item| i64::from(item.quantity) * item.unit_price)
            .sum();
        let totals = pricing::price_order(subtotal, request.shipping_method);

        let submitted = Totals {
            subtotal: request.subtotal,
            discount: request.discount,
            tax: request.tax,
            shipping: request.shipping,
            total: request.total,
        };
        if submitted != totals {
            warn!(
                submitted_total = submitted.total,
                priced_total = totals.total,
                "Rejected order with totals that do not match catalog pricing"
            );
            return Err(ServiceError::ValidationError(
                "Submitted totals do not match current catalog pricing; refresh the cart"
                    .to_string(),
            ));
        }

        let (agent_id, agent_commission_rate) = match request.agent_id {
            Some(agent_id) => {
                let agent = self.agent_service.get_active_agent(agent_id).await?;
                (Some(agent.id), Some(agent.commission_rate))
            }
            None => (None, None),
        };

        let order = self
            .order_service
            .create_order(OrderDraft {
                user_id: user.user_id,
                items: priced_items,
                currency: self.currency.clone(),
                payment_method: request.payment_method,
                shipping_method: request.shipping_method,
                totals,
                shipping_address: request.shipping_address,
                agent_id,
                agent_commission_rate,
            })
            .await?;

        // Offline settlement needs no gateway involvement at all
        let status = if request.payment_method.is_offline() {
            self.order_service
                .mark_confirmed(order.id)
                .await?
                .into_model()
                .status
        } else {
            order.status
        };

        Ok(PlaceOrderResponse {
            order_id: order.id,
            order_number: order.order_number,
            status,
        })
    }

    /// Opens a provider-side order so the buyer can run the hosted payment.
    ///
    /// The charged amount is the stored order total; nothing from the
    /// client is forwarded to the provider. When the provider is down the
    /// order is left PENDING and the call can simply be retried.
    #[instrument(skip(self), fields(user_id = %user.user_id, order_id = %order_id))]
    pub async fn create_gateway_order(
        &self,
        user: &AuthUser,
        order_id: Uuid,
    ) -> Result<GatewayOrderResponse, ServiceError> {
        let order = self
            .order_service
            .get_order_for_user(order_id, user.user_id)
            .await?;

        if order.payment_method.is_offline() {
            return Err(ServiceError::ValidationError(
                "Cash on delivery orders do not take online payment".to_string(),
            ));
        }
        if order.status != OrderStatus::Pending {
            return Err(ServiceError::InvalidTransition(format!(
                "Order {} is {} and can no longer start a payment",
                order.order_number,
                order.status.as_str()
            )));
        }

        let gateway_order = self
            .payment_provider
            .create_order(order.total, &order.currency, &order.order_number)
            .await?;

        self.order_service
            .set_gateway_order_id(order_id, &gateway_order.id)
            .await?;

        info!(
            gateway_order_id = %gateway_order.id,
            provider = self.payment_provider.name(),
            "Gateway order opened"
        );

        Ok(GatewayOrderResponse {
            gateway_order_id: gateway_order.id,
            amount: gateway_order.amount,
            currency: gateway_order.currency,
        })
    }

    /// Settles a payment callback. This is the single path by which an
    /// order becomes PAID.
    ///
    /// An order that already left PENDING reports its settled outcome as is;
    /// a replayed callback never re-runs verification. Otherwise the
    /// callback must reference the gateway order recorded on the order and
    /// its signature must verify: verified marks the order PAID, a bad
    /// signature marks it FAILED and reports the failure in the response
    /// body rather than as a transport error. Callbacks racing on one order
    /// are decided by the store's conditional update.
    #[instrument(skip(self, request), fields(user_id = %user.user_id, order_id = %request.order_id))]
    pub async fn verify_payment(
        &self,
        user: &AuthUser,
        request: VerifyPaymentRequest,
    ) -> Result<VerifyPaymentResponse, ServiceError> {
        request.validate()?;

        let order = self
            .order_service
            .get_order_for_user(request.order_id, user.user_id)
            .await?;

        if order.status.is_terminal() {
            info!(
                order_status = order.status.as_str(),
                "Payment callback for an already-settled order"
            );
            let status = if order.status == OrderStatus::Failed {
                VerificationStatus::Failed
            } else {
                VerificationStatus::Success
            };
            return Ok(VerifyPaymentResponse {
                status,
                order_status: order.status,
            });
        }

        if order.gateway_order_id.as_deref() != Some(request.gateway_order_id.as_str()) {
            warn!(
                presented = %request.gateway_order_id,
                "Payment callback for a gateway order not recorded on this order"
            );
            self.order_service
                .mark_failed(
                    request.order_id,
                    "Payment callback did not match the recorded payment attempt",
                )
                .await?;
            return Err(ServiceError::VerificationFailed(
                "Payment callback does not match the order's recorded payment attempt"
                    .to_string(),
            ));
        }

        let verified = self
            .payment_provider
            .verify_payment(
                &request.gateway_order_id,
                &request.gateway_payment_id,
                &request.signature,
            )
            .await;

        if verified {
            let outcome = self
                .order_service
                .mark_paid(request.order_id, &request.gateway_payment_id)
                .await?;
            Ok(VerifyPaymentResponse {
                status: VerificationStatus::Success,
                order_status: outcome.into_model().status,
            })
        } else {
            let outcome = self
                .order_service
                .mark_failed(request.order_id, "Payment signature verification failed")
                .await?;
            Ok(VerifyPaymentResponse {
                status: VerificationStatus::Failed,
                order_status: outcome.into_model().status,
            })
        }
    }
}
