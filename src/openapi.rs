use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Learnstack API",
        version = "1.0.0",
        description = r#"
# Learnstack Course Commerce API

Checkout, coupon redemption, order management, and course enrollment for
the Learnstack platform.

## Checkout semantics

A checkout is atomic: the order, payment record, course enrollments, and
coupon redemption either all commit or none do. Coupon quota is enforced
with a conditional increment, so concurrent checkouts can never oversell a
limited coupon.

## Error handling

Failures return a structured body with a stable machine-readable `kind`:

```json
{
  "kind": "coupon_exhausted",
  "message": "Coupon usage limit reached: LAUNCH10",
  "timestamp": "2025-11-02T00:00:00Z"
}
```
        "#,
        contact(
            name = "Learnstack Support",
            email = "support@learnstack.dev",
            url = "https://learnstack.dev"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "checkout", description = "Atomic cart checkout"),
        (name = "coupons", description = "Coupon administration"),
        (name = "orders", description = "Order lookup"),
        (name = "enrollments", description = "Course enrollment lookup")
    ),
    paths(
        crate::handlers::checkout::checkout,
        crate::handlers::coupons::create_coupon,
        crate::handlers::coupons::list_coupons,
        crate::handlers::coupons::get_coupon,
        crate::handlers::coupons::deactivate_coupon,
        crate::handlers::orders::get_order,
        crate::handlers::enrollments::list_enrollments,
    ),
    components(
        schemas(
            // Checkout types
            crate::services::checkout::CheckoutRequest,
            crate::services::checkout::CheckoutReceipt,
            crate::services::checkout::CartItem,
            crate::services::checkout::Address,
            crate::services::payments::PaymentMethod,

            // Coupon types
            crate::services::coupons::CreateCouponInput,
            crate::services::coupons::CouponListResponse,
            crate::entities::coupon::Model,
            crate::entities::coupon::CouponType,

            // Order and enrollment types
            crate::services::orders::OrderResponse,
            crate::entities::order_item::Model,
            crate::entities::enrollment::Model,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_covers_checkout() {
        let openapi = ApiDoc::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Learnstack API"));
        assert!(json.contains("/api/v1/checkout"));
        assert!(json.contains("coupon_exhausted"));
    }
}
