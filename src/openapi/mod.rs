use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "SalonPro Storefront API",
        version = "0.2.0",
        description = r#"
# SalonPro Wholesale Storefront API

Order placement and payment verification for the SalonPro salon-products
wholesale storefront.

## Flow

1. Browse `/products` and `/agents` (public).
2. `POST /checkout/orders` with cart lines and the totals shown to the
   buyer. The server reprices the cart; a mismatch is rejected. COD
   orders come back `CONFIRMED`, online orders come back `PENDING`.
3. `POST /checkout/orders/{id}/gateway-order` to open the provider-side
   order for the stored total.
4. Complete the hosted payment, then `POST /checkout/payments/verify`
   with the provider's callback fields. A verified signature marks the
   order `PAID`; a bad one marks it `FAILED`.

## Authentication

Order and checkout endpoints require a JWT bearer token:

```
Authorization: Bearer <your-jwt-token>
```

## Amounts

All monetary amounts are integers in minor currency units (paise for
INR). `discount` is negative or zero and
`total = subtotal + discount + tax + shipping` always holds.
        "#,
        contact(
            name = "SalonPro Support",
            email = "support@salonpro.example"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Checkout", description = "Order placement and payment verification"),
        (name = "Orders", description = "Buyer order history"),
        (name = "Catalog", description = "Public product catalog"),
        (name = "Agents", description = "Public sales agent directory")
    ),
    paths(
        crate::handlers::checkout::place_order,
        crate::handlers::checkout::create_gateway_order,
        crate::handlers::checkout::verify_payment,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::products::list_products,
        crate::handlers::agents::list_agents,
    ),
    components(
        schemas(
            crate::services::checkout::PlaceOrderRequest,
            crate::services::checkout::OrderItemRequest,
            crate::services::checkout::PlaceOrderResponse,
            crate::services::checkout::GatewayOrderResponse,
            crate::services::checkout::VerifyPaymentRequest,
            crate::services::checkout::VerifyPaymentResponse,
            crate::services::checkout::VerificationStatus,
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderSummaryResponse,
            crate::services::orders::OrderItemResponse,
            crate::services::orders::OrderListResponse,
            crate::services::orders::ShippingAddress,
            crate::services::agents::AgentResponse,
            crate::services::catalog::ProductResponse,
            crate::entities::order::OrderStatus,
            crate::entities::order::PaymentMethod,
            crate::entities::order::ShippingMethod,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
