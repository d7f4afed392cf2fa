use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::PaginationParams,
    services::orders::{OrderListResponse, OrderResponse},
    AppState,
};

/// Creates the router for the buyer's order history endpoints
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
}

/// List the authenticated buyer's orders
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    description = "Pages through the authenticated buyer's own orders, newest first.",
    params(PaginationParams),
    responses(
        (status = 200, description = "Orders retrieved", body = OrderListResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<OrderListResponse>, ServiceError> {
    let (page, per_page) = params.normalized(
        u64::from(state.config.api_default_page_size),
        u64::from(state.config.api_max_page_size),
    );
    let response = state
        .services
        .orders
        .list_orders_for_user(auth_user.user_id, page, per_page)
        .await?;
    Ok(Json(response))
}

/// Get one of the authenticated buyer's orders
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    description = "Fetches a single order with its line items. Only the order's owner can read it.",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order retrieved", body = OrderResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Order belongs to another user", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ServiceError> {
    let response = state
        .services
        .orders
        .get_order_for_user(id, auth_user.user_id)
        .await?;
    Ok(Json(response))
}
