//! Service-level tests for the order state machine.
//!
//! Tests cover:
//! - Draft validation (totals equation, line sums, agent pairing)
//! - Guarded transitions out of PENDING
//! - Idempotent replays and conflicting payment ids
//! - Terminal state protection
//! - Gateway order linking rules

mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use salonpro_api::{
    entities::order::{OrderStatus, PaymentMethod, ShippingMethod},
    errors::ServiceError,
    pricing,
    services::orders::{DraftItem, OrderDraft, ShippingAddress},
};
use uuid::Uuid;

fn shipping_address() -> ShippingAddress {
    ShippingAddress {
        name: "Meera Salon Supplies".to_string(),
        street: "14 Brigade Road".to_string(),
        city: "Bengaluru".to_string(),
        state: "Karnataka".to_string(),
        postal_code: "560001".to_string(),
        phone: "+91-9890012345".to_string(),
    }
}

fn draft_for(user_id: Uuid, unit_price: i64, quantity: i32) -> OrderDraft {
    let subtotal = unit_price * i64::from(quantity);
    OrderDraft {
        user_id,
        items: vec![DraftItem {
            product_id: None,
            name: "Argan Oil Shampoo 1L".to_string(),
            quantity,
            unit_price,
        }],
        currency: "INR".to_string(),
        payment_method: PaymentMethod::Upi,
        shipping_method: ShippingMethod::Standard,
        totals: pricing::price_order(subtotal, ShippingMethod::Standard),
        shipping_address: shipping_address(),
        agent_id: None,
        agent_commission_rate: None,
    }
}

fn cod_draft_for(user_id: Uuid, unit_price: i64, quantity: i32) -> OrderDraft {
    OrderDraft {
        payment_method: PaymentMethod::Cod,
        ..draft_for(user_id, unit_price, quantity)
    }
}

#[tokio::test]
async fn create_order_persists_pending_with_lines() {
    let app = TestApp::new().await;
    let orders = app.state.services.orders.clone();

    let order = orders
        .create_order(draft_for(app.buyer_id, 4200, 2))
        .await
        .expect("create order");

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.subtotal, 8400);
    assert_eq!(order.discount, -840);
    assert_eq!(order.tax, 1512);
    assert_eq!(order.shipping, 0);
    assert_eq!(order.total, 9072);
    assert!(order.order_number.starts_with("ORD-"));
    assert!(order.paid_at.is_none());
    assert!(order.gateway_order_id.is_none());

    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].quantity, 2);
    assert_eq!(order.items[0].line_total, 8400);
}

#[tokio::test]
async fn create_order_rejects_broken_totals() {
    let app = TestApp::new().await;
    let orders = app.state.services.orders.clone();

    // Equation violated by one paisa.
    let mut draft = draft_for(app.buyer_id, 4200, 2);
    draft.totals.total += 1;
    assert_matches!(
        orders.create_order(draft).await,
        Err(ServiceError::ValidationError(_))
    );

    // Subtotal that is not the sum of the lines.
    let mut draft = draft_for(app.buyer_id, 4200, 2);
    draft.totals = pricing::price_order(9000, ShippingMethod::Standard);
    assert_matches!(
        orders.create_order(draft).await,
        Err(ServiceError::ValidationError(_))
    );

    // Agent id without a commission snapshot.
    let mut draft = draft_for(app.buyer_id, 4200, 2);
    draft.agent_id = Some(Uuid::new_v4());
    assert_matches!(
        orders.create_order(draft).await,
        Err(ServiceError::ValidationError(_))
    );

    // Commission snapshot without an agent.
    let mut draft = draft_for(app.buyer_id, 4200, 2);
    draft.agent_commission_rate = Some(dec!(7.50));
    assert_matches!(
        orders.create_order(draft).await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn mark_paid_is_idempotent_for_replays() {
    let app = TestApp::new().await;
    let orders = app.state.services.orders.clone();
    let order = orders
        .create_order(draft_for(app.buyer_id, 2600, 1))
        .await
        .expect("create order");

    let first = orders
        .mark_paid(order.id, "pay_alpha01")
        .await
        .expect("first settlement");
    assert!(first.did_transition());
    let model = first.into_model();
    assert_eq!(model.status, OrderStatus::Paid);
    assert_eq!(model.gateway_payment_id.as_deref(), Some("pay_alpha01"));
    assert!(model.paid_at.is_some());

    // The same callback delivered twice settles once.
    let replay = orders
        .mark_paid(order.id, "pay_alpha01")
        .await
        .expect("replay accepted");
    assert!(!replay.did_transition());
    assert_eq!(replay.into_model().status, OrderStatus::Paid);
}

#[tokio::test]
async fn mark_paid_rejects_a_second_payment() {
    let app = TestApp::new().await;
    let orders = app.state.services.orders.clone();
    let order = orders
        .create_order(draft_for(app.buyer_id, 2600, 1))
        .await
        .expect("create order");

    orders
        .mark_paid(order.id, "pay_alpha01")
        .await
        .expect("first settlement");

    assert_matches!(
        orders.mark_paid(order.id, "pay_beta02").await,
        Err(ServiceError::InvalidTransition(_))
    );

    // The recorded payment is untouched.
    let current = orders.get_order(order.id).await.expect("reload order");
    assert_eq!(current.gateway_payment_id.as_deref(), Some("pay_alpha01"));
}

#[tokio::test]
async fn terminal_states_are_final() {
    let app = TestApp::new().await;
    let orders = app.state.services.orders.clone();

    let paid = orders
        .create_order(draft_for(app.buyer_id, 2600, 1))
        .await
        .expect("create paid order");
    orders.mark_paid(paid.id, "pay_a").await.expect("settle");

    let confirmed = orders
        .create_order(cod_draft_for(app.buyer_id, 2600, 1))
        .await
        .expect("create confirmed order");
    orders.mark_confirmed(confirmed.id).await.expect("confirm");

    let failed = orders
        .create_order(draft_for(app.buyer_id, 2600, 1))
        .await
        .expect("create failed order");
    orders
        .mark_failed(failed.id, "signature mismatch")
        .await
        .expect("fail");

    assert_matches!(
        orders.mark_confirmed(paid.id).await,
        Err(ServiceError::InvalidTransition(_))
    );
    assert_matches!(
        orders.mark_failed(paid.id, "late callback").await,
        Err(ServiceError::InvalidTransition(_))
    );

    assert_matches!(
        orders.mark_paid(confirmed.id, "pay_x").await,
        Err(ServiceError::InvalidTransition(_))
    );
    assert_matches!(
        orders.mark_failed(confirmed.id, "late callback").await,
        Err(ServiceError::InvalidTransition(_))
    );

    assert_matches!(
        orders.mark_paid(failed.id, "pay_x").await,
        Err(ServiceError::InvalidTransition(_))
    );
    assert_matches!(
        orders.mark_confirmed(failed.id).await,
        Err(ServiceError::InvalidTransition(_))
    );

    // Re-applying the state an order already has is an idempotent no-op.
    let unchanged = orders
        .mark_confirmed(confirmed.id)
        .await
        .expect("confirm replay");
    assert!(!unchanged.did_transition());
    let unchanged = orders
        .mark_failed(failed.id, "signature mismatch")
        .await
        .expect("fail replay");
    assert!(!unchanged.did_transition());
}

#[tokio::test]
async fn mark_confirmed_requires_cash_on_delivery() {
    let app = TestApp::new().await;
    let orders = app.state.services.orders.clone();
    let order = orders
        .create_order(draft_for(app.buyer_id, 2600, 1))
        .await
        .expect("create order");

    assert_matches!(
        orders.mark_confirmed(order.id).await,
        Err(ServiceError::InvalidTransition(_))
    );

    // The rejected confirmation leaves the order where it was.
    let current = orders.get_order(order.id).await.expect("reload order");
    assert_eq!(current.status, OrderStatus::Pending);
}

#[tokio::test]
async fn gateway_link_only_while_pending() {
    let app = TestApp::new().await;
    let orders = app.state.services.orders.clone();
    let order = orders
        .create_order(draft_for(app.buyer_id, 2600, 1))
        .await
        .expect("create order");

    let linked = orders
        .set_gateway_order_id(order.id, "order_first001")
        .await
        .expect("link gateway order");
    assert_eq!(linked.gateway_order_id.as_deref(), Some("order_first001"));

    // A retried payment attempt re-links; verification pins to the newest.
    let relinked = orders
        .set_gateway_order_id(order.id, "order_retry002")
        .await
        .expect("relink gateway order");
    assert_eq!(relinked.gateway_order_id.as_deref(), Some("order_retry002"));

    let found = orders
        .find_by_gateway_order_id("order_retry002")
        .await
        .expect("lookup");
    assert_eq!(found.map(|o| o.id), Some(order.id));
    assert!(orders
        .find_by_gateway_order_id("order_unknown")
        .await
        .expect("lookup")
        .is_none());

    orders.mark_paid(order.id, "pay_a").await.expect("settle");
    assert_matches!(
        orders.set_gateway_order_id(order.id, "order_late003").await,
        Err(ServiceError::InvalidTransition(_))
    );
}

#[tokio::test]
async fn orders_are_scoped_to_their_buyer() {
    let app = TestApp::new().await;
    let orders = app.state.services.orders.clone();
    let order = orders
        .create_order(draft_for(app.buyer_id, 2600, 1))
        .await
        .expect("create order");

    let loaded = orders
        .get_order_for_user(order.id, app.buyer_id)
        .await
        .expect("owner loads own order");
    assert_eq!(loaded.id, order.id);

    assert_matches!(
        orders.get_order_for_user(order.id, Uuid::new_v4()).await,
        Err(ServiceError::Forbidden(_))
    );
    assert_matches!(
        orders.get_order_for_user(Uuid::new_v4(), app.buyer_id).await,
        Err(ServiceError::NotFound(_))
    );
}
