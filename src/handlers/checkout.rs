use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::post,
    Router,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::checkout::{
        GatewayOrderResponse, PlaceOrderRequest, PlaceOrderResponse, VerifyPaymentRequest,
        VerifyPaymentResponse,
    },
    AppState,
};

/// Creates the router for checkout endpoints
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(place_order))
        .route("/orders/:id/gateway-order", post(create_gateway_order))
        .route("/payments/verify", post(verify_payment))
}

/// Place an order
#[utoipa::path(
    post,
    path = "/api/v1/checkout/orders",
    summary = "Place order",
    description = "Reprices the cart server-side and creates an order. COD orders come back CONFIRMED; online orders come back PENDING awaiting payment.",
    request_body = PlaceOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = PlaceOrderResponse),
        (status = 400, description = "Invalid cart, totals mismatch, or unknown agent", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Checkout"
)]
pub async fn place_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<PlaceOrderResponse>), ServiceError> {
    let response = state
        .services
        .checkout
        .place_order(&auth_user, request)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Open a gateway order for an order awaiting online payment
#[utoipa::path(
    post,
    path = "/api/v1/checkout/orders/{id}/gateway-order",
    summary = "Create gateway order",
    description = "Opens a provider-side order for the stored total so the hosted payment flow can run. Retryable while the order is PENDING.",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Gateway order opened", body = GatewayOrderResponse),
        (status = 400, description = "Order does not take online payment", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Order belongs to another user", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already settled", body = crate::errors::ErrorResponse),
        (status = 503, description = "Payment gateway unavailable", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Checkout"
)]
pub async fn create_gateway_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<GatewayOrderResponse>, ServiceError> {
    let response = state
        .services
        .checkout
        .create_gateway_order(&auth_user, id)
        .await?;
    Ok(Json(response))
}

/// Verify a completed payment
#[utoipa::path(
    post,
    path = "/api/v1/checkout/payments/verify",
    summary = "Verify payment",
    description = "Checks the payment signature against the recorded gateway order. Success marks the order PAID; a bad signature marks it FAILED and is reported in the response body. A callback for an already-settled order reports its outcome without re-verifying.",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Verification outcome", body = VerifyPaymentResponse),
        (status = 400, description = "Malformed verification payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 402, description = "Callback does not match the recorded payment attempt", body = crate::errors::ErrorResponse),
        (status = 403, description = "Order belongs to another user", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "A concurrent callback settled the order with a different payment", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Checkout"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>, ServiceError> {
    let response = state
        .services
        .checkout
        .verify_payment(&auth_user, request)
        .await?;
    Ok(Json(response))
}
