//! Catalog visibility, vendor isolation and purchase-gated reviews.

mod common;

use assert_matches::assert_matches;
use common::TestContext;
use marketplace_api::{
    entities::user::UserRole,
    errors::ServiceError,
    services::{catalog::UpdateProductInput, reviews::ReviewInput},
};
use rust_decimal_macros::dec;

#[tokio::test]
async fn public_listing_hides_unavailable_products_and_honors_search() {
    let ctx = TestContext::new().await;
    let vendor = ctx.register("vendor_pub", UserRole::Vendor).await;

    let visible = ctx.seed_product(&vendor, "Walnut Desk", dec!(250.00)).await;
    let hidden = ctx.seed_product(&vendor, "Oak Desk", dec!(300.00)).await;
    ctx.services
        .catalog
        .update_product(
            &vendor,
            hidden,
            UpdateProductInput {
                name: None,
                description: None,
                price: None,
                available: Some(false),
            },
        )
        .await
        .unwrap();

    let (all, total) = ctx.services.catalog.list_public(None, 1, 10).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(all[0].id, visible);
    assert_eq!(all[0].vendor_name.as_deref(), Some("vendor_pub name"));

    let (matched, _) = ctx
        .services
        .catalog
        .list_public(Some("Walnut"), 1, 10)
        .await
        .unwrap();
    assert_eq!(matched.len(), 1);

    let (unmatched, _) = ctx
        .services
        .catalog
        .list_public(Some("Marble"), 1, 10)
        .await
        .unwrap();
    assert!(unmatched.is_empty());

    let detail = ctx.services.catalog.get_public(hidden).await;
    assert_matches!(detail, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn vendors_cannot_touch_each_others_products() {
    let ctx = TestContext::new().await;
    let vendor_a = ctx.register("vendor_iso_a", UserRole::Vendor).await;
    let vendor_b = ctx.register("vendor_iso_b", UserRole::Vendor).await;

    let product = ctx.seed_product(&vendor_a, "Lathe", dec!(900.00)).await;

    let read = ctx.services.catalog.get_vendor_product(&vendor_b, product).await;
    assert_matches!(read, Err(ServiceError::NotFound(_)));

    let update = ctx
        .services
        .catalog
        .update_product(
            &vendor_b,
            product,
            UpdateProductInput {
                name: Some("Stolen Lathe".to_string()),
                description: None,
                price: None,
                available: None,
            },
        )
        .await;
    assert_matches!(update, Err(ServiceError::NotFound(_)));

    let delete = ctx.services.catalog.delete_product(&vendor_b, product).await;
    assert_matches!(delete, Err(ServiceError::NotFound(_)));

    // The owner still sees it untouched.
    let mine = ctx
        .services
        .catalog
        .get_vendor_product(&vendor_a, product)
        .await
        .unwrap();
    assert_eq!(mine.name, "Lathe");
}

#[tokio::test]
async fn reviews_require_a_prior_purchase_and_are_unique_per_buyer() {
    let ctx = TestContext::new().await;
    let vendor = ctx.register("vendor_rev", UserRole::Vendor).await;
    let buyer = ctx.register("shopper_rev", UserRole::User).await;
    let stranger = ctx.register("shopper_rev_none", UserRole::User).await;

    let product = ctx.seed_product(&vendor, "Kettle", dec!(25.00)).await;

    // No purchase yet: review creation is forbidden.
    let premature = ctx
        .services
        .reviews
        .create(
            &buyer,
            product,
            ReviewInput {
                rating: 5,
                comment: "great".to_string(),
            },
        )
        .await;
    assert_matches!(premature, Err(ServiceError::Forbidden(_)));

    ctx.add_to_cart(&buyer, product, 1).await;
    ctx.services.orders.place_order(&buyer).await.unwrap();

    // Out-of-range ratings are invalid input even after purchase.
    let bad_rating = ctx
        .services
        .reviews
        .create(
            &buyer,
            product,
            ReviewInput {
                rating: 6,
                comment: String::new(),
            },
        )
        .await;
    assert_matches!(bad_rating, Err(ServiceError::InvalidInput(_)));

    let review = ctx
        .services
        .reviews
        .create(
            &buyer,
            product,
            ReviewInput {
                rating: 4,
                comment: "solid kettle".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(review.rating, 4);

    let duplicate = ctx
        .services
        .reviews
        .create(
            &buyer,
            product,
            ReviewInput {
                rating: 5,
                comment: "again".to_string(),
            },
        )
        .await;
    assert_matches!(duplicate, Err(ServiceError::InvalidOperation(_)));

    // A non-purchaser cannot edit someone else's review.
    let foreign_update = ctx
        .services
        .reviews
        .update(
            &stranger,
            product,
            review.id,
            ReviewInput {
                rating: 1,
                comment: "sabotage".to_string(),
            },
        )
        .await;
    assert_matches!(foreign_update, Err(ServiceError::Forbidden(_)));

    // The author can update and the listing reflects it.
    ctx.services
        .reviews
        .update(
            &buyer,
            product,
            review.id,
            ReviewInput {
                rating: 3,
                comment: "cooled off".to_string(),
            },
        )
        .await
        .unwrap();

    let listed = ctx.services.reviews.list_for_product(product).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].rating, 3);
    assert_eq!(listed[0].user_name.as_deref(), Some("shopper_rev name"));

    ctx.services
        .reviews
        .delete(&buyer, product, review.id)
        .await
        .unwrap();
    assert!(ctx
        .services
        .reviews
        .list_for_product(product)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn accounts_register_login_and_change_password() {
    let ctx = TestContext::new().await;
    let principal = ctx.register("login_round_trip", UserRole::User).await;

    // Fresh registration logs in with the seeded password.
    let (account, token) = ctx
        .services
        .accounts
        .login("login_round_trip", "correct-horse-battery")
        .await
        .unwrap();
    assert_eq!(account.id, principal.user_id);
    assert!(!token.access_token.is_empty());

    // The token resolves back to the same principal.
    let claims = ctx.auth.validate_token(&token.access_token).unwrap();
    let restored = ctx.auth.principal_from_claims(claims).unwrap();
    assert_eq!(restored.user_id, principal.user_id);
    assert_eq!(restored.role, UserRole::User);

    let bad = ctx
        .services
        .accounts
        .login("login_round_trip", "wrong-password")
        .await;
    assert_matches!(bad, Err(ServiceError::AuthError(_)));

    // Duplicate usernames are rejected.
    let duplicate = ctx
        .services
        .accounts
        .register(marketplace_api::services::accounts::RegisterInput {
            username: "login_round_trip".to_string(),
            name: "Someone Else".to_string(),
            email: "someone_else@example.com".to_string(),
            phone: "5550101".to_string(),
            role: UserRole::User,
            password: "another-password".to_string(),
        })
        .await;
    assert_matches!(duplicate, Err(ServiceError::Conflict(_)));

    // Password change requires the old password and takes effect.
    let wrong_old = ctx
        .services
        .accounts
        .change_password(
            principal.user_id,
            marketplace_api::services::accounts::ChangePasswordInput {
                old_password: "not-it".to_string(),
                new_password: "brand-new-password".to_string(),
            },
        )
        .await;
    assert_matches!(wrong_old, Err(ServiceError::ValidationError(_)));

    ctx.services
        .accounts
        .change_password(
            principal.user_id,
            marketplace_api::services::accounts::ChangePasswordInput {
                old_password: "correct-horse-battery".to_string(),
                new_password: "brand-new-password".to_string(),
            },
        )
        .await
        .unwrap();

    assert!(ctx
        .services
        .accounts
        .login("login_round_trip", "brand-new-password")
        .await
        .is_ok());
}
