use crate::{
    db::DbPool,
    entities::order::{
        self, ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel,
        OrderStatus, PaymentMethod, ShippingMethod,
    },
    entities::order_item::{self, ActiveModel as OrderItemActiveModel, Entity as OrderItemEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    pricing::Totals,
};
use chrono::{DateTime, Utc};
use metrics::counter;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Recipient address captured with every order.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ShippingAddress {
    #[serde(default)]
    #[validate(length(max = 100, message = "Recipient name is too long"))]
    pub name: String,
    #[validate(length(min = 1, max = 255, message = "Street address is required"))]
    pub street: String,
    #[validate(length(min = 1, max = 100, message = "City is required"))]
    pub city: String,
    #[serde(default)]
    #[validate(length(max = 100, message = "State name is too long"))]
    pub state: String,
    #[validate(length(min = 1, max = 20, message = "Postal code is required"))]
    pub postal_code: String,
    #[serde(default)]
    #[validate(length(max = 20, message = "Phone number is too long"))]
    pub phone: String,
}

/// A priced order line. Prices are catalog prices in minor units, resolved
/// by the checkout layer before the draft reaches the store.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DraftItem {
    pub product_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255, message = "Item name is required"))]
    pub name: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(range(min = 0, message = "Unit price cannot be negative"))]
    pub unit_price: i64,
}

/// Fully-priced order draft. Everything in here has already been resolved
/// server-side; the store validates the invariants once more and persists.
#[derive(Debug, Clone, Validate)]
pub struct OrderDraft {
    pub user_id: Uuid,
    #[validate]
    pub items: Vec<DraftItem>,
    #[validate(length(min = 3, max = 3, message = "Currency must be 3 characters"))]
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub shipping_method: ShippingMethod,
    pub totals: Totals,
    #[validate]
    pub shipping_address: ShippingAddress,
    pub agent_id: Option<Uuid>,
    pub agent_commission_rate: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Option<Uuid>,
    pub name: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub line_total: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub shipping_method: ShippingMethod,
    pub currency: String,
    pub subtotal: i64,
    pub discount: i64,
    pub tax: i64,
    pub shipping: i64,
    pub total: i64,
    pub shipping_address: ShippingAddress,
    pub agent_id: Option<Uuid>,
    pub agent_commission_rate: Option<Decimal>,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub failure_reason: Option<String>,
    pub items: Vec<OrderItemResponse>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderSummaryResponse {
    pub id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub total: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderSummaryResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Result of a guarded status transition. `Unchanged` is the idempotent
/// outcome: an equivalent call already performed the transition.
#[derive(Debug)]
pub enum MarkOutcome {
    Transitioned(OrderModel),
    Unchanged(OrderModel),
}

impl MarkOutcome {
    pub fn into_model(self) -> OrderModel {
        match self {
            MarkOutcome::Transitioned(model) | MarkOutcome::Unchanged(model) => model,
        }
    }

    pub fn did_transition(&self) -> bool {
        matches!(self, MarkOutcome::Transitioned(_))
    }
}

/// Order store. All status transitions go through the guarded `mark_*`
/// methods, which compare-and-swap on the PENDING status in a single UPDATE
/// so concurrent callbacks cannot both win.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    /// Creates a new order service instance
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Persists a validated draft as a PENDING order with its line items.
    #[instrument(skip(self, draft), fields(user_id = %draft.user_id, total = draft.totals.total))]
    pub async fn create_order(&self, draft: OrderDraft) -> Result<OrderResponse, ServiceError> {
        validate_draft(&draft)?;

        let db = &*self.db_pool;
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order_number = generate_order_number();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let order_active_model = OrderActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            user_id: Set(draft.user_id),
            status: Set(OrderStatus::Pending),
            payment_method: Set(draft.payment_method),
            shipping_method: Set(draft.shipping_method),
            currency: Set(draft.currency.clone()),
            subtotal: Set(draft.totals.subtotal),
            discount: Set(draft.totals.discount),
            tax: Set(draft.totals.tax),
            shipping: Set(draft.totals.shipping),
            total: Set(draft.totals.total),
            ship_name: Set(draft.shipping_address.name.clone()),
            ship_street: Set(draft.shipping_address.street.clone()),
            ship_city: Set(draft.shipping_address.city.clone()),
            ship_state: Set(draft.shipping_address.state.clone()),
            ship_postal_code: Set(draft.shipping_address.postal_code.clone()),
            ship_phone: Set(draft.shipping_address.phone.clone()),
            agent_id: Set(draft.agent_id),
            agent_commission_rate: Set(draft.agent_commission_rate),
            gateway_order_id: Set(None),
            gateway_payment_id: Set(None),
            failure_reason: Set(None),
            paid_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let order_model = order_active_model.insert(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to create order in database");
            ServiceError::DatabaseError(e)
        })?;

        for item in &draft.items {
            let item_model = OrderItemActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(item.product_id),
                name: Set(item.name.clone()),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
                line_total: Set(item.unit_price * i64::from(item.quantity)),
                created_at: Set(now),
            };
            item_model.insert(&txn).await.map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to create order line");
                ServiceError::DatabaseError(e)
            })?;
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order creation transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, order_number = %order_number, "Order created");
        counter!("orders.created", 1);

        if let Err(e) = self.event_sender.send(Event::OrderCreated(order_id)).await {
            warn!(error = %e, order_id = %order_id, "Failed to send order created event");
        }

        let items = self.load_items(&order_model).await?;
        Ok(model_to_response(order_model, items))
    }

    /// Retrieves an order with its line items.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let order = self.require_order(order_id).await?;
        let items = self.load_items(&order).await?;
        Ok(model_to_response(order, items))
    }

    /// Retrieves an order, rejecting callers that do not own it.
    #[instrument(skip(self), fields(order_id = %order_id, user_id = %user_id))]
    pub async fn get_order_for_user(
        &self,
        order_id: Uuid,
        user_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        let order = self.require_order(order_id).await?;
        if order.user_id != user_id {
            warn!(owner = %order.user_id, "Rejected access to another buyer's order");
            return Err(ServiceError::Forbidden(
                "You do not have access to this order".to_string(),
            ));
        }
        let items = self.load_items(&order).await?;
        Ok(model_to_response(order, items))
    }

    /// Lists the caller's orders, newest first.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_orders_for_user(
        &self,
        user_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let db = &*self.db_pool;
        let page = page.max(1);

        let paginator = OrderEntity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count orders");
            ServiceError::DatabaseError(e)
        })?;

        let orders = paginator.fetch_page(page - 1).await.map_err(|e| {
            error!(error = %e, page, per_page, "Failed to fetch orders page");
            ServiceError::DatabaseError(e)
        })?;

        Ok(OrderListResponse {
            orders: orders.into_iter().map(model_to_summary).collect(),
            total,
            page,
            per_page,
        })
    }

    /// Looks up an order by the provider-side order id attached to it.
    #[instrument(skip(self))]
    pub async fn find_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<OrderModel>, ServiceError> {
        let db = &*self.db_pool;
        OrderEntity::find()
            .filter(order::Column::GatewayOrderId.eq(gateway_order_id))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Attaches a provider-side order id. Allowed only while the order is
    /// still PENDING; a retried payment attempt overwrites the previous link
    /// so verification is always pinned to the newest gateway order.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn set_gateway_order_id(
        &self,
        order_id: Uuid,
        gateway_order_id: &str,
    ) -> Result<OrderModel, ServiceError> {
        let db = &*self.db_pool;
        let result = OrderEntity::update_many()
            .set(OrderActiveModel {
                gateway_order_id: Set(Some(gateway_order_id.to_string())),
                updated_at: Set(Utc::now()),
                ..Default::default()
            })
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .exec(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if result.rows_affected == 0 {
            let existing = self.require_order(order_id).await?;
            return Err(ServiceError::InvalidTransition(format!(
                "Order {} is {} and can no longer start a payment",
                existing.order_number,
                existing.status.as_str()
            )));
        }

        let order = self.require_order(order_id).await?;
        info!(gateway_order_id, "Gateway order attached");

        if let Err(e) = self
            .event_sender
            .send(Event::GatewayOrderCreated {
                order_id,
                gateway_order_id: gateway_order_id.to_string(),
            })
            .await
        {
            warn!(error = %e, order_id = %order_id, "Failed to send gateway order event");
        }

        Ok(order)
    }

    /// Marks a PENDING order PAID, recording the payment id that won.
    ///
    /// The transition races against other verification callbacks for the
    /// same order, so it is a single conditional UPDATE. A replay carrying
    /// the payment id already recorded is an idempotent success; a different
    /// payment id on a non-PENDING order is a conflict.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn mark_paid(
        &self,
        order_id: Uuid,
        gateway_payment_id: &str,
    ) -> Result<MarkOutcome, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let result = OrderEntity::update_many()
            .set(OrderActiveModel {
                status: Set(OrderStatus::Paid),
                gateway_payment_id: Set(Some(gateway_payment_id.to_string())),
                paid_at: Set(Some(now)),
                updated_at: Set(now),
                ..Default::default()
            })
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .exec(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if result.rows_affected == 1 {
            let order = self.require_order(order_id).await?;
            info!(gateway_payment_id, "Order marked paid");
            counter!("orders.paid", 1);

            if let Err(e) = self
                .event_sender
                .send(Event::OrderPaid {
                    order_id,
                    gateway_payment_id: gateway_payment_id.to_string(),
                })
                .await
            {
                warn!(error = %e, order_id = %order_id, "Failed to send order paid event");
            }

            return Ok(MarkOutcome::Transitioned(order));
        }

        let existing = self.require_order(order_id).await?;
        match existing.status {
            OrderStatus::Paid
                if existing.gateway_payment_id.as_deref() == Some(gateway_payment_id) =>
            {
                info!("Replayed payment confirmation for already-paid order");
                Ok(MarkOutcome::Unchanged(existing))
            }
            OrderStatus::Paid => {
                warn!(
                    recorded = existing.gateway_payment_id.as_deref().unwrap_or(""),
                    presented = gateway_payment_id,
                    "Conflicting payment id for already-paid order"
                );
                Err(ServiceError::InvalidTransition(format!(
                    "Order {} is already paid with a different payment",
                    existing.order_number
                )))
            }
            status => Err(ServiceError::InvalidTransition(format!(
                "Order {} is {} and cannot be marked paid",
                existing.order_number,
                status.as_str()
            ))),
        }
    }

    /// Marks a PENDING order FAILED with the reason verification gave.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn mark_failed(
        &self,
        order_id: Uuid,
        reason: &str,
    ) -> Result<MarkOutcome, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let result = OrderEntity::update_many()
            .set(OrderActiveModel {
                status: Set(OrderStatus::Failed),
                failure_reason: Set(Some(reason.to_string())),
                updated_at: Set(now),
                ..Default::default()
            })
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .exec(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if result.rows_affected == 1 {
            let order = self.require_order(order_id).await?;
            warn!(reason, "Order marked failed");
            counter!("orders.payment_failed", 1);

            if let Err(e) = self
                .event_sender
                .send(Event::OrderPaymentFailed {
                    order_id,
                    reason: reason.to_string(),
                })
                .await
            {
                warn!(error = %e, order_id = %order_id, "Failed to send payment failed event");
            }

            return Ok(MarkOutcome::Transitioned(order));
        }

        let existing = self.require_order(order_id).await?;
        match existing.status {
            OrderStatus::Failed => Ok(MarkOutcome::Unchanged(existing)),
            status => Err(ServiceError::InvalidTransition(format!(
                "Order {} is {} and cannot be marked failed",
                existing.order_number,
                status.as_str()
            ))),
        }
    }

    /// Marks a PENDING cash-on-delivery order CONFIRMED. Orders taking
    /// online payment are rejected here, not just by the caller.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn mark_confirmed(&self, order_id: Uuid) -> Result<MarkOutcome, ServiceError> {
        let db = &*self.db_pool;

        let result = OrderEntity::update_many()
            .set(OrderActiveModel {
                status: Set(OrderStatus::Confirmed),
                updated_at: Set(Utc::now()),
                ..Default::default()
            })
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .filter(order::Column::PaymentMethod.eq(PaymentMethod::Cod))
            .exec(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if result.rows_affected == 1 {
            let order = self.require_order(order_id).await?;
            info!("Order confirmed for offline settlement");
            counter!("orders.confirmed", 1);

            if let Err(e) = self.event_sender.send(Event::OrderConfirmed(order_id)).await {
                warn!(error = %e, order_id = %order_id, "Failed to send order confirmed event");
            }

            return Ok(MarkOutcome::Transitioned(order));
        }

        let existing = self.require_order(order_id).await?;
        if !existing.payment_method.is_offline() {
            return Err(ServiceError::InvalidTransition(format!(
                "Order {} takes online payment and cannot be confirmed for offline settlement",
                existing.order_number
            )));
        }
        match existing.status {
            OrderStatus::Confirmed => Ok(MarkOutcome::Unchanged(existing)),
            status => Err(ServiceError::InvalidTransition(format!(
                "Order {} is {} and cannot be confirmed",
                existing.order_number,
                status.as_str()
            ))),
        }
    }

    async fn require_order(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        let db = &*self.db_pool;
        OrderEntity::find_by_id(order_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    async fn load_items(
        &self,
        order: &OrderModel,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        let db = &*self.db_pool;
        order
            .find_related(OrderItemEntity)
            .order_by_asc(order_item::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }
}

/// Check every invariant a draft must satisfy before it may be persisted.
fn validate_draft(draft: &OrderDraft) -> Result<(), ServiceError> {
    draft.validate()?;

    if draft.items.is_empty() {
        return Err(ServiceError::ValidationError(
            "Order must contain at least one item".to_string(),
        ));
    }

    let mut line_sum: i64 = 0;
    for item in &draft.items {
        let line_total = i64::from(item.quantity)
            .checked_mul(item.unit_price)
            .ok_or_else(|| {
                ServiceError::ValidationError("Line total overflows".to_string())
            })?;
        line_sum = line_sum.checked_add(line_total).ok_or_else(|| {
            ServiceError::ValidationError("Order subtotal overflows".to_string())
        })?;
    }

    if line_sum != draft.totals.subtotal {
        return Err(ServiceError::ValidationError(format!(
            "Subtotal {} does not match the sum of line items {}",
            draft.totals.subtotal, line_sum
        )));
    }

    if !draft.totals.is_consistent() {
        return Err(ServiceError::ValidationError(
            "Order totals must satisfy total = subtotal + discount + tax + shipping".to_string(),
        ));
    }

    if draft.agent_id.is_some() != draft.agent_commission_rate.is_some() {
        return Err(ServiceError::ValidationError(
            "Agent attribution requires both agent and commission rate".to_string(),
        ));
    }

    Ok(())
}

fn generate_order_number() -> String {
    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!(
        "ORD-{}-{}",
        Utc::now().format("%Y%m%d"),
        suffix.to_uppercase()
    )
}

fn model_to_summary(order: OrderModel) -> OrderSummaryResponse {
    OrderSummaryResponse {
        id: order.id,
        order_number: order.order_number,
        status: order.status,
        payment_method: order.payment_method,
        total: order.total,
        currency: order.currency,
        created_at: order.created_at,
    }
}

fn model_to_response(order: OrderModel, items: Vec<order_item::Model>) -> OrderResponse {
    OrderResponse {
        id: order.id,
        order_number: order.order_number,
        user_id: order.user_id,
        status: order.status,
        payment_method: order.payment_method,
        shipping_method: order.shipping_method,
        currency: order.currency,
        subtotal: order.subtotal,
        discount: order.discount,
        tax: order.tax,
        shipping: order.shipping,
        total: order.total,
        shipping_address: ShippingAddress {
            name: order.ship_name,
            street: order.ship_street,
            city: order.ship_city,
            state: order.ship_state,
            postal_code: order.ship_postal_code,
            phone: order.ship_phone,
        },
        agent_id: order.agent_id,
        agent_commission_rate: order.agent_commission_rate,
        gateway_order_id: order.gateway_order_id,
        gateway_payment_id: order.gateway_payment_id,
        failure_reason: order.failure_reason,
        items: items
            .into_iter()
            .map(|item| OrderItemResponse {
                id: item.id,
                product_id: item.product_id,
                name: item.name,
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total: item.line_total,
            })
            .collect(),
        paid_at: order.paid_at,
        created_at: order.created_at,
        updated_at: order.updated_at,
    }
}
