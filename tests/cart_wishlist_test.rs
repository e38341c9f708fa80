//! Cart and wishlist behavior: quantity upserts, removal, validation.

mod common;

use assert_matches::assert_matches;
use common::TestContext;
use marketplace_api::{
    entities::user::UserRole,
    errors::ServiceError,
    services::carts::AddToCartInput,
};
use rust_decimal_macros::dec;
use uuid::Uuid;

#[tokio::test]
async fn adding_the_same_product_twice_sums_quantities() {
    let ctx = TestContext::new().await;
    let vendor = ctx.register("vendor_cart_sum", UserRole::Vendor).await;
    let shopper = ctx.register("shopper_cart_sum", UserRole::User).await;

    let product = ctx.seed_product(&vendor, "Pen", dec!(1.50)).await;
    ctx.add_to_cart(&shopper, product, 2).await;
    ctx.add_to_cart(&shopper, product, 3).await;

    let entries = ctx.services.cart.list(&shopper).await.unwrap();
    assert_eq!(entries.len(), 1, "upsert must not create a second row");
    assert_eq!(entries[0].quantity, 5);
    assert_eq!(
        entries[0].product.as_ref().map(|p| p.name.as_str()),
        Some("Pen")
    );
}

#[tokio::test]
async fn cart_rejects_non_positive_quantities_and_unknown_products() {
    let ctx = TestContext::new().await;
    let vendor = ctx.register("vendor_cart_bad", UserRole::Vendor).await;
    let shopper = ctx.register("shopper_cart_bad", UserRole::User).await;

    let product = ctx.seed_product(&vendor, "Ruler", dec!(2.00)).await;

    let zero = ctx
        .services
        .cart
        .add(
            &shopper,
            AddToCartInput {
                product_id: product,
                quantity: 0,
            },
        )
        .await;
    assert_matches!(zero, Err(ServiceError::ValidationError(_)));

    let ghost = ctx
        .services
        .cart
        .add(
            &shopper,
            AddToCartInput {
                product_id: Uuid::new_v4(),
                quantity: 1,
            },
        )
        .await;
    assert_matches!(ghost, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn removing_a_cart_line_only_touches_that_line() {
    let ctx = TestContext::new().await;
    let vendor = ctx.register("vendor_cart_rm", UserRole::Vendor).await;
    let shopper = ctx.register("shopper_cart_rm", UserRole::User).await;

    let p1 = ctx.seed_product(&vendor, "Stapler", dec!(6.00)).await;
    let p2 = ctx.seed_product(&vendor, "Tape", dec!(2.50)).await;
    ctx.add_to_cart(&shopper, p1, 1).await;
    ctx.add_to_cart(&shopper, p2, 1).await;

    ctx.services.cart.remove(&shopper, p1).await.unwrap();

    let entries = ctx.services.cart.list(&shopper).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].product_id, p2);

    let again = ctx.services.cart.remove(&shopper, p1).await;
    assert_matches!(again, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn wishlist_add_is_idempotent() {
    let ctx = TestContext::new().await;
    let vendor = ctx.register("vendor_wish", UserRole::Vendor).await;
    let shopper = ctx.register("shopper_wish", UserRole::User).await;

    let product = ctx.seed_product(&vendor, "Globe", dec!(30.00)).await;
    ctx.services.wishlist.add(&shopper, product).await.unwrap();
    ctx.services.wishlist.add(&shopper, product).await.unwrap();

    let entries = ctx.services.wishlist.list(&shopper).await.unwrap();
    assert_eq!(entries.len(), 1);

    ctx.services.wishlist.remove(&shopper, product).await.unwrap();
    assert!(ctx.services.wishlist.list(&shopper).await.unwrap().is_empty());

    let missing = ctx.services.wishlist.remove(&shopper, product).await;
    assert_matches!(missing, Err(ServiceError::NotFound(_)));
}
