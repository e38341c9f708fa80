use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Marketplace API",
        version = "0.1.0",
        description = r#"
# Multi-Vendor Marketplace API

Backend for a multi-vendor storefront: vendor product catalogs, per-user
carts and wishlists, the order lifecycle (placement, checkout, cancellation,
returns), per-vendor fulfillment tracking and purchase-gated reviews.

## Authentication

Authenticated endpoints take a JWT in the Authorization header:

```
Authorization: Bearer <your-jwt-token>
```

Obtain one from `POST /api/v1/auth/login`.
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Order lifecycle endpoints"),
        (name = "Fulfillment", description = "Vendor fulfillment endpoints"),
    ),
    paths(
        crate::handlers::orders::place_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::checkout_order,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::return_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::vendor_orders::list_vendor_order_items,
        crate::handlers::vendor_orders::update_fulfillment_status,
    ),
    components(
        schemas(
            crate::handlers::orders::ReasonRequest,
            crate::handlers::orders::UpdateOrderStatusRequest,
            crate::handlers::vendor_orders::UpdateFulfillmentRequest,
            crate::services::orders::VendorOrderItem,
            crate::errors::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
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

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDocV1::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_generates() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string(&openapi).unwrap();
        assert!(json.contains("Marketplace API"));
        assert!(json.contains("/api/v1/orders/place"));
    }
}
