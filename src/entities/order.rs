use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Order document. Monetary fields are integer minor-currency units and the
/// arithmetic invariant `total == subtotal + discount + tax + shipping` holds
/// for every persisted row (discount is stored negative). `total` never
/// changes after insertion.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    #[validate(length(
        min = 1,
        max = 50,
        message = "Order number must be between 1 and 50 characters"
    ))]
    pub order_number: String,

    /// Buyer identity as established by authentication
    pub user_id: Uuid,

    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub shipping_method: ShippingMethod,

    pub currency: String,
    pub subtotal: i64,
    /// Negative adjustment
    pub discount: i64,
    pub tax: i64,
    pub shipping: i64,
    pub total: i64,

    pub ship_name: String,
    pub ship_street: String,
    pub ship_city: String,
    pub ship_state: String,
    pub ship_postal_code: String,
    pub ship_phone: String,

    pub agent_id: Option<Uuid>,
    /// Commission percentage frozen at order creation
    #[sea_orm(column_type = "Decimal(Some((5, 2)))", nullable)]
    pub agent_commission_rate: Option<Decimal>,

    /// Provider-side order id, set once a gateway order has been opened
    pub gateway_order_id: Option<String>,
    /// Provider-side payment id, set exactly once when the order is paid
    pub gateway_payment_id: Option<String>,
    pub failure_reason: Option<String>,

    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    #[sea_orm(
        belongs_to = "super::agent::Entity",
        from = "Column::AgentId",
        to = "super::agent::Column::Id"
    )]
    Agent,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::agent::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Agent.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = Utc::now();
        if insert {
            if self.id.is_not_set() {
                self.id = Set(Uuid::new_v4());
            }
            if self.created_at.is_not_set() {
                self.created_at = Set(now);
            }
            let model: Model = self
                .clone()
                .try_into()
                .map_err(|e| DbErr::Custom(format!("Incomplete order row: {e}")))?;
            model
                .validate()
                .map_err(|e| DbErr::Custom(format!("Order validation failed: {e}")))?;
        }
        self.updated_at = Set(now);
        Ok(self)
    }
}

/// Order status lifecycle. `Pending` is the only non-terminal state; the
/// three terminal states are never left again in this flow.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "PAID")]
    Paid,
    #[sea_orm(string_value = "CONFIRMED")]
    Confirmed,
    #[sea_orm(string_value = "FAILED")]
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Failed => "FAILED",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "upi")]
    Upi,
    #[sea_orm(string_value = "card")]
    Card,
    #[sea_orm(string_value = "cod")]
    Cod,
}

impl PaymentMethod {
    /// Cash on delivery settles offline and never opens a gateway order.
    pub fn is_offline(&self) -> bool {
        matches!(self, PaymentMethod::Cod)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
pub enum ShippingMethod {
    #[sea_orm(string_value = "standard")]
    Standard,
    #[sea_orm(string_value = "express")]
    Express,
}
