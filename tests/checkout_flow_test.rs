//! Integration tests for the checkout flow over the HTTP surface.
//!
//! Tests cover:
//! - Order placement with server-side repricing
//! - Gateway order creation pinned to the stored total
//! - Payment verification (success, forgery, mismatched callback, replay)
//! - Cash-on-delivery confirmation without gateway involvement
//! - Gateway outage handling and retry
//! - Ownership and authentication guards

mod common;

use axum::{body, http::Method, response::Response};
use common::TestApp;
use rust_decimal_macros::dec;
use salonpro_api::{
    entities::{agent, order::ShippingMethod, product},
    pricing,
};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};
use uuid::Uuid;

async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

fn shipping_address() -> Value {
    json!({
        "name": "Meera Salon Supplies",
        "street": "14 Brigade Road",
        "city": "Bengaluru",
        "state": "Karnataka",
        "postal_code": "560001",
        "phone": "+91-9890012345"
    })
}

/// Build a checkout payload whose totals agree with the server's pricing
/// policy for the given product and quantity.
fn checkout_payload(product: &product::Model, quantity: i32, payment_method: &str) -> Value {
    let subtotal = product.unit_price * i64::from(quantity);
    let totals = pricing::price_order(subtotal, ShippingMethod::Standard);
    json!({
        "items": [{ "product_id": product.id, "quantity": quantity }],
        "subtotal": totals.subtotal,
        "discount": totals.discount,
        "tax": totals.tax,
        "shipping": totals.shipping,
        "total": totals.total,
        "shipping_address": shipping_address(),
        "payment_method": payment_method,
        "shipping_method": "standard"
    })
}

// ==================== Online Payment Flow ====================

#[tokio::test]
async fn online_checkout_happy_path() {
    let app = TestApp::new().await;
    let shampoo = app
        .seed_product("SAL-ARG-100", "Argan Oil Shampoo 1L", 4200)
        .await;

    // The storefront's canonical cart: 2 x 4200 with the 10% order discount
    // and 18% tax on the undiscounted subtotal.
    let payload = json!({
        "items": [{ "product_id": shampoo.id, "quantity": 2 }],
        "subtotal": 8400,
        "discount": -840,
        "tax": 1512,
        "shipping": 0,
        "total": 9072,
        "shipping_address": shipping_address(),
        "payment_method": "upi",
        "shipping_method": "standard"
    });

    let response = app
        .request_authenticated(Method::POST, "/api/v1/checkout/orders", Some(payload))
        .await;
    assert_eq!(response.status(), 201);
    let placed = response_json(response).await;
    assert_eq!(placed["status"], "PENDING");
    let order_id = placed["order_id"].as_str().expect("order id").to_string();
    assert!(placed["order_number"]
        .as_str()
        .expect("order number")
        .starts_with("ORD-"));

    // Opening the gateway order quotes the stored total, not anything the
    // client sent.
    let response = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/checkout/orders/{}/gateway-order", order_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let gateway = response_json(response).await;
    assert_eq!(gateway["amount"], 9072);
    assert_eq!(gateway["currency"], "INR");
    let gateway_order_id = gateway["gateway_order_id"]
        .as_str()
        .expect("gateway order id")
        .to_string();

    // The buyer completes the hosted payment; the callback carries the
    // provider's signature over (order id, payment id).
    let (payment_id, signature) = app.provider.simulate_payment(&gateway_order_id);
    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/checkout/payments/verify",
            Some(json!({
                "order_id": order_id,
                "gateway_order_id": gateway_order_id,
                "gateway_payment_id": payment_id,
                "signature": signature
            })),
        )
        .await;
    assert_eq!(response.status(), 200);
    let verified = response_json(response).await;
    assert_eq!(verified["status"], "success");
    assert_eq!(verified["order_status"], "PAID");

    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/orders/{}", order_id), None)
        .await;
    assert_eq!(response.status(), 200);
    let order = response_json(response).await;
    assert_eq!(order["status"], "PAID");
    assert_eq!(order["gateway_payment_id"].as_str(), Some(payment_id.as_str()));
    assert!(order["paid_at"].is_string());
    assert_eq!(order["total"], 9072);
}

#[tokio::test]
async fn rejects_totals_that_disagree_with_catalog() {
    let app = TestApp::new().await;
    let shampoo = app
        .seed_product("SAL-ARG-100", "Argan Oil Shampoo 1L", 4200)
        .await;

    // Internally consistent figures computed against a stale 4 000 price.
    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/checkout/orders",
            Some(json!({
                "items": [{ "product_id": shampoo.id, "quantity": 2 }],
                "subtotal": 8000,
                "discount": -800,
                "tax": 1440,
                "shipping": 0,
                "total": 8640,
                "shipping_address": shipping_address(),
                "payment_method": "upi",
                "shipping_method": "standard"
            })),
        )
        .await;
    assert_eq!(response.status(), 400);
    let error = response_json(response).await;
    assert_eq!(error["error"], "Bad Request");

    // Nothing was persisted for the buyer.
    let response = app
        .request_authenticated(Method::GET, "/api/v1/orders", None)
        .await;
    let listing = response_json(response).await;
    assert_eq!(listing["total"], 0);
}

#[tokio::test]
async fn forged_signature_fails_the_order() {
    let app = TestApp::new().await;
    let mask = app.seed_product("SAL-KER-050", "Keratin Mask 500ml", 2600).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/checkout/orders",
            Some(checkout_payload(&mask, 1, "card")),
        )
        .await;
    assert_eq!(response.status(), 201);
    let placed = response_json(response).await;
    let order_id = placed["order_id"].as_str().expect("order id").to_string();

    let response = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/checkout/orders/{}/gateway-order", order_id),
            None,
        )
        .await;
    let gateway = response_json(response).await;
    let gateway_order_id = gateway["gateway_order_id"].as_str().expect("id").to_string();

    let (payment_id, _) = app.provider.simulate_payment(&gateway_order_id);
    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/checkout/payments/verify",
            Some(json!({
                "order_id": order_id,
                "gateway_order_id": gateway_order_id,
                "gateway_payment_id": payment_id,
                "signature": "deadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef"
            })),
        )
        .await;

    // A bad signature is a handled outcome, not an error response.
    assert_eq!(response.status(), 200);
    let verified = response_json(response).await;
    assert_eq!(verified["status"], "failed");
    assert_eq!(verified["order_status"], "FAILED");

    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/orders/{}", order_id), None)
        .await;
    let order = response_json(response).await;
    assert_eq!(order["status"], "FAILED");
    assert!(order["failure_reason"].is_string());
    assert!(order["gateway_payment_id"].is_null());
}

#[tokio::test]
async fn mismatched_gateway_order_fails_verification() {
    let app = TestApp::new().await;
    let mask = app.seed_product("SAL-KER-050", "Keratin Mask 500ml", 2600).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/checkout/orders",
            Some(checkout_payload(&mask, 1, "upi")),
        )
        .await;
    let placed = response_json(response).await;
    let order_id = placed["order_id"].as_str().expect("order id").to_string();

    let response = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/checkout/orders/{}/gateway-order", order_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);

    // A callback for some other gateway order, validly signed, still must
    // not settle this order.
    let (payment_id, signature) = app.provider.simulate_payment("order_someoneelse01");
    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/checkout/payments/verify",
            Some(json!({
                "order_id": order_id,
                "gateway_order_id": "order_someoneelse01",
                "gateway_payment_id": payment_id,
                "signature": signature
            })),
        )
        .await;
    assert_eq!(response.status(), 402);

    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/orders/{}", order_id), None)
        .await;
    assert_eq!(response_json(response).await["status"], "FAILED");
}

#[tokio::test]
async fn verify_replay_reports_settled_outcome_without_reverifying() {
    let app = TestApp::new().await;
    let mask = app.seed_product("SAL-KER-050", "Keratin Mask 500ml", 2600).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/checkout/orders",
            Some(checkout_payload(&mask, 3, "upi")),
        )
        .await;
    let placed = response_json(response).await;
    let order_id = placed["order_id"].as_str().expect("order id").to_string();

    let response = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/checkout/orders/{}/gateway-order", order_id),
            None,
        )
        .await;
    let gateway = response_json(response).await;
    let gateway_order_id = gateway["gateway_order_id"].as_str().expect("id").to_string();

    let (payment_id, signature) = app.provider.simulate_payment(&gateway_order_id);
    let verify_payload = json!({
        "order_id": order_id,
        "gateway_order_id": gateway_order_id,
        "gateway_payment_id": payment_id,
        "signature": signature
    });

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/checkout/payments/verify",
            Some(verify_payload.clone()),
        )
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(response_json(response).await["status"], "success");
    assert_eq!(app.provider.verify_calls(), 1);

    // The gateway retries its callback: same payment id, same signature.
    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/checkout/payments/verify",
            Some(verify_payload),
        )
        .await;
    assert_eq!(response.status(), 200);
    let replayed = response_json(response).await;
    assert_eq!(replayed["status"], "success");
    assert_eq!(replayed["order_status"], "PAID");

    // A different, validly signed payment id arrives late. The settled order
    // reports its outcome as is; the recorded payment is not overwritten and
    // the signature is never re-checked.
    let (other_payment_id, other_signature) = app.provider.simulate_payment(&gateway_order_id);
    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/checkout/payments/verify",
            Some(json!({
                "order_id": order_id,
                "gateway_order_id": gateway_order_id,
                "gateway_payment_id": other_payment_id,
                "signature": other_signature
            })),
        )
        .await;
    assert_eq!(response.status(), 200);
    let late = response_json(response).await;
    assert_eq!(late["status"], "success");
    assert_eq!(late["order_status"], "PAID");
    assert_eq!(app.provider.verify_calls(), 1);

    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/orders/{}", order_id), None)
        .await;
    let order = response_json(response).await;
    assert_eq!(order["gateway_payment_id"].as_str(), Some(payment_id.as_str()));
}

#[tokio::test]
async fn gateway_outage_leaves_order_retryable() {
    let app = TestApp::new().await;
    let mask = app.seed_product("SAL-KER-050", "Keratin Mask 500ml", 2600).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/checkout/orders",
            Some(checkout_payload(&mask, 1, "upi")),
        )
        .await;
    let placed = response_json(response).await;
    let order_id = placed["order_id"].as_str().expect("order id").to_string();

    app.provider.set_failing(true);
    let response = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/checkout/orders/{}/gateway-order", order_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 503);

    // The order did not burn: still PENDING and retryable.
    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/orders/{}", order_id), None)
        .await;
    assert_eq!(response_json(response).await["status"], "PENDING");

    app.provider.set_failing(false);
    let response = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/checkout/orders/{}/gateway-order", order_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let gateway = response_json(response).await;
    let gateway_order_id = gateway["gateway_order_id"].as_str().expect("id").to_string();

    let (payment_id, signature) = app.provider.simulate_payment(&gateway_order_id);
    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/checkout/payments/verify",
            Some(json!({
                "order_id": order_id,
                "gateway_order_id": gateway_order_id,
                "gateway_payment_id": payment_id,
                "signature": signature
            })),
        )
        .await;
    assert_eq!(response_json(response).await["order_status"], "PAID");
}

// ==================== Cash on Delivery ====================

#[tokio::test]
async fn cod_checkout_confirms_without_gateway() {
    let app = TestApp::new().await;
    let shampoo = app
        .seed_product("SAL-ARG-100", "Argan Oil Shampoo 1L", 4200)
        .await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/checkout/orders",
            Some(checkout_payload(&shampoo, 2, "cod")),
        )
        .await;
    assert_eq!(response.status(), 201);
    let placed = response_json(response).await;
    assert_eq!(placed["status"], "CONFIRMED");
    let order_id = placed["order_id"].as_str().expect("order id").to_string();

    assert_eq!(app.provider.create_calls(), 0);

    // Online payment machinery refuses offline orders.
    let response = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/checkout/orders/{}/gateway-order", order_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 400);
    assert_eq!(app.provider.create_calls(), 0);
}

// ==================== Agent Attribution ====================

#[tokio::test]
async fn agent_commission_is_snapshotted_at_placement() {
    let app = TestApp::new().await;
    let shampoo = app
        .seed_product("SAL-ARG-100", "Argan Oil Shampoo 1L", 4200)
        .await;
    let priya = app.seed_agent("Priya Sharma", dec!(7.50), true).await;

    let mut payload = checkout_payload(&shampoo, 1, "cod");
    payload["agent_id"] = json!(priya.id);
    let response = app
        .request_authenticated(Method::POST, "/api/v1/checkout/orders", Some(payload))
        .await;
    assert_eq!(response.status(), 201);
    let placed = response_json(response).await;
    let order_id = placed["order_id"].as_str().expect("order id").to_string();

    // The agent's live rate changes after the sale; the order keeps the
    // rate that was in force when it was placed.
    agent::ActiveModel {
        id: Set(priya.id),
        commission_rate: Set(dec!(9.99)),
        ..Default::default()
    }
    .update(app.state.db.as_ref())
    .await
    .expect("update agent rate");

    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/orders/{}", order_id), None)
        .await;
    let order = response_json(response).await;
    assert_eq!(order["agent_id"].as_str(), Some(priya.id.to_string().as_str()));
    assert_eq!(order["agent_commission_rate"], "7.50");
}

#[tokio::test]
async fn deactivated_agents_cannot_be_attributed() {
    let app = TestApp::new().await;
    let shampoo = app
        .seed_product("SAL-ARG-100", "Argan Oil Shampoo 1L", 4200)
        .await;
    let dormant = app.seed_agent("Dormant Agent", dec!(5.00), false).await;

    let mut payload = checkout_payload(&shampoo, 1, "upi");
    payload["agent_id"] = json!(dormant.id);
    let response = app
        .request_authenticated(Method::POST, "/api/v1/checkout/orders", Some(payload))
        .await;
    assert_eq!(response.status(), 400);
}

// ==================== Guards and Validation ====================

#[tokio::test]
async fn buyers_cannot_read_each_others_orders() {
    let app = TestApp::new().await;
    let mask = app.seed_product("SAL-KER-050", "Keratin Mask 500ml", 2600).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/checkout/orders",
            Some(checkout_payload(&mask, 1, "cod")),
        )
        .await;
    let placed = response_json(response).await;
    let order_id = placed["order_id"].as_str().expect("order id").to_string();

    let other_token = app.token_for(Uuid::new_v4());
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order_id),
            None,
            Some(&other_token),
        )
        .await;
    assert_eq!(response.status(), 403);

    // The other buyer's listing does not include it either.
    let response = app
        .request(Method::GET, "/api/v1/orders", None, Some(&other_token))
        .await;
    assert_eq!(response_json(response).await["total"], 0);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order_id),
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn validation_rejects_malformed_carts() {
    let app = TestApp::new().await;
    let shampoo = app
        .seed_product("SAL-ARG-100", "Argan Oil Shampoo 1L", 4200)
        .await;

    // Empty cart.
    let mut payload = checkout_payload(&shampoo, 1, "upi");
    payload["items"] = json!([]);
    let response = app
        .request_authenticated(Method::POST, "/api/v1/checkout/orders", Some(payload))
        .await;
    assert_eq!(response.status(), 400);

    // Zero quantity.
    let mut payload = checkout_payload(&shampoo, 1, "upi");
    payload["items"] = json!([{ "product_id": shampoo.id, "quantity": 0 }]);
    let response = app
        .request_authenticated(Method::POST, "/api/v1/checkout/orders", Some(payload))
        .await;
    assert_eq!(response.status(), 400);

    // Product that is not in the catalog.
    let mut payload = checkout_payload(&shampoo, 1, "upi");
    payload["items"] = json!([{ "product_id": Uuid::new_v4(), "quantity": 1 }]);
    let response = app
        .request_authenticated(Method::POST, "/api/v1/checkout/orders", Some(payload))
        .await;
    assert_eq!(response.status(), 400);

    // No bearer token at all.
    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/orders",
            Some(checkout_payload(&shampoo, 1, "upi")),
            None,
        )
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn order_listing_paginates_newest_first() {
    let app = TestApp::new().await;
    let shampoo = app
        .seed_product("SAL-ARG-100", "Argan Oil Shampoo 1L", 4200)
        .await;

    let mut order_numbers = Vec::new();
    for quantity in 1..=3 {
        let response = app
            .request_authenticated(
                Method::POST,
                "/api/v1/checkout/orders",
                Some(checkout_payload(&shampoo, quantity, "cod")),
            )
            .await;
        let placed = response_json(response).await;
        order_numbers.push(placed["order_number"].as_str().expect("number").to_string());
    }

    let response = app
        .request_authenticated(Method::GET, "/api/v1/orders?page=1&per_page=2", None)
        .await;
    assert_eq!(response.status(), 200);
    let first_page = response_json(response).await;
    assert_eq!(first_page["total"], 3);
    assert_eq!(first_page["page"], 1);
    assert_eq!(first_page["per_page"], 2);
    assert_eq!(first_page["orders"].as_array().expect("orders").len(), 2);
    assert_eq!(
        first_page["orders"][0]["order_number"].as_str(),
        Some(order_numbers[2].as_str())
    );

    let response = app
        .request_authenticated(Method::GET, "/api/v1/orders?page=2&per_page=2", None)
        .await;
    let second_page = response_json(response).await;
    assert_eq!(second_page["orders"].as_array().expect("orders").len(), 1);
    assert_eq!(
        second_page["orders"][0]["order_number"].as_str(),
        Some(order_numbers[0].as_str())
    );
}

// ==================== Public Surface ====================

#[tokio::test]
async fn catalog_and_agents_are_public() {
    let app = TestApp::new().await;
    app.seed_product("SAL-ARG-100", "Argan Oil Shampoo 1L", 4200)
        .await;
    app.seed_agent("Priya Sharma", dec!(7.50), true).await;
    app.seed_agent("Dormant Agent", dec!(5.00), false).await;

    let response = app
        .request(Method::GET, "/api/v1/products", None, None)
        .await;
    assert_eq!(response.status(), 200);
    let products = response_json(response).await;
    assert_eq!(products.as_array().expect("products").len(), 1);
    assert_eq!(products[0]["sku"], "SAL-ARG-100");
    assert_eq!(products[0]["unit_price"], 4200);

    let response = app.request(Method::GET, "/api/v1/agents", None, None).await;
    assert_eq!(response.status(), 200);
    let agents = response_json(response).await;
    let agents = agents.as_array().expect("agents");
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0]["name"], "Priya Sharma");
    // Contact details stay internal.
    assert!(agents[0].get("email").is_none());

    let response = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), 200);
    let response = app.request(Method::GET, "/health/ready", None, None).await;
    assert_eq!(response.status(), 200);
}
