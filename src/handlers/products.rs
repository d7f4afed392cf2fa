use axum::{extract::State, response::Json, routing::get, Router};

use crate::{errors::ServiceError, services::catalog::ProductResponse, AppState};

/// Creates the router for the public product catalog
pub fn products_routes() -> Router<AppState> {
    Router::new().route("/", get(list_products))
}

/// List active products
#[utoipa::path(
    get,
    path = "/api/v1/products",
    summary = "List products",
    description = "Active catalog products with unit prices in minor currency units.",
    responses(
        (status = 200, description = "Products retrieved", body = [ProductResponse]),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "Catalog"
)]
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductResponse>>, ServiceError> {
    let products = state.services.catalog.list_active_products().await?;
    Ok(Json(products))
}
