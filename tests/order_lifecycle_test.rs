//! End-to-end tests for the order lifecycle: cart conversion, checkout,
//! cancellation, returns and per-vendor fulfillment. Everything runs
//! against an in-memory SQLite database with the full schema applied.

mod common;

use assert_matches::assert_matches;
use common::TestContext;
use marketplace_api::{
    entities::{
        cart_item,
        order::{self, OrderStatus, PaymentStatus},
        order_item::FulfillmentStatus,
    },
    errors::ServiceError,
    entities::user::UserRole,
};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

#[tokio::test]
async fn placing_an_order_snapshots_prices_and_clears_the_cart() {
    let ctx = TestContext::new().await;
    let vendor = ctx.register("vendor_snap", UserRole::Vendor).await;
    let shopper = ctx.register("shopper_snap", UserRole::User).await;

    let p1 = ctx.seed_product(&vendor, "Keyboard", dec!(10.00)).await;
    let p2 = ctx.seed_product(&vendor, "Mouse", dec!(5.00)).await;
    ctx.add_to_cart(&shopper, p1, 2).await;
    ctx.add_to_cart(&shopper, p2, 1).await;

    let placed = ctx.services.orders.place_order(&shopper).await.unwrap();

    assert_eq!(placed.order.total, dec!(25.00));
    assert_eq!(placed.order.status, OrderStatus::Pending);
    assert_eq!(placed.order.payment_status, PaymentStatus::Pending);
    assert_eq!(placed.items.len(), 2);
    for item in &placed.items {
        assert_eq!(item.vendor_id, Some(vendor.user_id));
        assert_eq!(item.fulfillment_status, FulfillmentStatus::Pending);
    }

    let cart_left = cart_item::Entity::find()
        .filter(cart_item::Column::UserId.eq(shopper.user_id))
        .count(&*ctx.db)
        .await
        .unwrap();
    assert_eq!(cart_left, 0, "cart must be empty after placement");
}

#[tokio::test]
async fn order_total_is_decoupled_from_later_price_changes() {
    let ctx = TestContext::new().await;
    let vendor = ctx.register("vendor_decouple", UserRole::Vendor).await;
    let shopper = ctx.register("shopper_decouple", UserRole::User).await;

    let product = ctx.seed_product(&vendor, "Lamp", dec!(40.00)).await;
    ctx.add_to_cart(&shopper, product, 1).await;
    let placed = ctx.services.orders.place_order(&shopper).await.unwrap();

    ctx.services
        .catalog
        .update_product(
            &vendor,
            product,
            marketplace_api::services::catalog::UpdateProductInput {
                name: None,
                description: None,
                price: Some(dec!(99.99)),
                available: None,
            },
        )
        .await
        .unwrap();

    let fetched = ctx
        .services
        .orders
        .get_order(&shopper, placed.order.id)
        .await
        .unwrap();
    assert_eq!(fetched.order.total, dec!(40.00));
    assert_eq!(fetched.items[0].price, dec!(40.00));
}

#[tokio::test]
async fn placing_with_an_empty_cart_fails_and_creates_nothing() {
    let ctx = TestContext::new().await;
    let shopper = ctx.register("shopper_empty", UserRole::User).await;

    let result = ctx.services.orders.place_order(&shopper).await;
    assert_matches!(
        result,
        Err(ServiceError::InvalidOperation(msg)) if msg.contains("Cart is empty")
    );

    let orders = order::Entity::find().count(&*ctx.db).await.unwrap();
    assert_eq!(orders, 0);
}

#[tokio::test]
async fn checkout_is_idempotent_and_notifies_each_vendor_once() {
    let ctx = TestContext::new().await;
    let vendor_a = ctx.register("vendor_mail_a", UserRole::Vendor).await;
    let vendor_b = ctx.register("vendor_mail_b", UserRole::Vendor).await;
    let shopper = ctx.register("shopper_mail", UserRole::User).await;

    let p1 = ctx.seed_product(&vendor_a, "Desk", dec!(120.00)).await;
    let p2 = ctx.seed_product(&vendor_a, "Chair", dec!(80.00)).await;
    let p3 = ctx.seed_product(&vendor_b, "Rug", dec!(35.00)).await;
    ctx.add_to_cart(&shopper, p1, 1).await;
    ctx.add_to_cart(&shopper, p2, 1).await;
    ctx.add_to_cart(&shopper, p3, 2).await;

    let placed = ctx.services.orders.place_order(&shopper).await.unwrap();

    let outcome = ctx
        .services
        .orders
        .checkout(&shopper, placed.order.id)
        .await
        .unwrap();
    assert!(!outcome.already_paid);
    assert_eq!(outcome.order.payment_status, PaymentStatus::Paid);

    // One buyer mail plus one per distinct vendor, not one per line.
    {
        let sent = ctx.mailer.sent.lock().await;
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].0, "shopper_mail@example.com");
        let vendor_mails: Vec<_> = sent.iter().skip(1).map(|(to, _, _)| to.clone()).collect();
        assert!(vendor_mails.contains(&"vendor_mail_a@example.com".to_string()));
        assert!(vendor_mails.contains(&"vendor_mail_b@example.com".to_string()));
        // Vendor A's single mail lists both of their products.
        let vendor_a_mail = sent
            .iter()
            .find(|(to, _, _)| to == "vendor_mail_a@example.com")
            .unwrap();
        assert!(vendor_a_mail.2.contains("Desk"));
        assert!(vendor_a_mail.2.contains("Chair"));
    }

    // Second checkout: success, no state change, no new mail.
    let second = ctx
        .services
        .orders
        .checkout(&shopper, placed.order.id)
        .await
        .unwrap();
    assert!(second.already_paid);
    assert_eq!(second.order.payment_status, PaymentStatus::Paid);
    assert_eq!(ctx.mailer.sent.lock().await.len(), 3);
}

#[tokio::test]
async fn checkout_of_someone_elses_order_reads_as_missing() {
    let ctx = TestContext::new().await;
    let vendor = ctx.register("vendor_steal", UserRole::Vendor).await;
    let owner = ctx.register("shopper_owner", UserRole::User).await;
    let intruder = ctx.register("shopper_intruder", UserRole::User).await;

    let product = ctx.seed_product(&vendor, "Vase", dec!(15.00)).await;
    ctx.add_to_cart(&owner, product, 1).await;
    let placed = ctx.services.orders.place_order(&owner).await.unwrap();

    let result = ctx
        .services
        .orders
        .checkout(&intruder, placed.order.id)
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn cancel_succeeds_once_then_rejects() {
    let ctx = TestContext::new().await;
    let vendor = ctx.register("vendor_cancel", UserRole::Vendor).await;
    let shopper = ctx.register("shopper_cancel", UserRole::User).await;

    let product = ctx.seed_product(&vendor, "Mug", dec!(8.00)).await;
    ctx.add_to_cart(&shopper, product, 1).await;
    let placed = ctx.services.orders.place_order(&shopper).await.unwrap();

    let cancelled = ctx
        .services
        .orders
        .cancel_order(&shopper, placed.order.id, Some("changed mind".to_string()))
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(cancelled.is_cancelled);
    assert_eq!(cancelled.cancel_reason.as_deref(), Some("changed mind"));

    let second = ctx
        .services
        .orders
        .cancel_order(&shopper, placed.order.id, None)
        .await;
    assert_matches!(
        second,
        Err(ServiceError::InvalidOperation(msg)) if msg.contains("already cancelled")
    );
}

#[tokio::test]
async fn delivered_orders_cannot_cancel_but_can_return_once() {
    let ctx = TestContext::new().await;
    let vendor = ctx.register("vendor_return", UserRole::Vendor).await;
    let shopper = ctx.register("shopper_return", UserRole::User).await;
    let admin = ctx.register("admin_return", UserRole::Admin).await;

    let product = ctx.seed_product(&vendor, "Blender", dec!(60.00)).await;
    ctx.add_to_cart(&shopper, product, 1).await;
    let placed = ctx.services.orders.place_order(&shopper).await.unwrap();

    // A return before delivery is rejected.
    let early = ctx
        .services
        .orders
        .return_order(&shopper, placed.order.id, Some("defective".to_string()))
        .await;
    assert_matches!(
        early,
        Err(ServiceError::InvalidOperation(msg)) if msg.contains("not delivered")
    );

    ctx.deliver_order(&admin, placed.order.id).await;

    // Delivered orders must go through the return flow, not cancel.
    let cancel_attempt = ctx
        .services
        .orders
        .cancel_order(&shopper, placed.order.id, None)
        .await;
    assert_matches!(
        cancel_attempt,
        Err(ServiceError::InvalidOperation(msg)) if msg.contains("already delivered")
    );

    let returned = ctx
        .services
        .orders
        .return_order(&shopper, placed.order.id, Some("defective".to_string()))
        .await
        .unwrap();
    assert_eq!(returned.status, OrderStatus::Returned);
    assert!(returned.is_returned);
    assert_eq!(returned.return_reason.as_deref(), Some("defective"));

    let second = ctx
        .services
        .orders
        .return_order(&shopper, placed.order.id, None)
        .await;
    assert_matches!(
        second,
        Err(ServiceError::InvalidOperation(msg)) if msg.contains("already returned")
    );
}

#[tokio::test]
async fn vendors_update_only_their_own_lines_with_valid_statuses() {
    let ctx = TestContext::new().await;
    let vendor_a = ctx.register("vendor_ful_a", UserRole::Vendor).await;
    let vendor_b = ctx.register("vendor_ful_b", UserRole::Vendor).await;
    let shopper = ctx.register("shopper_ful", UserRole::User).await;

    let p1 = ctx.seed_product(&vendor_a, "Plant", dec!(12.00)).await;
    let p2 = ctx.seed_product(&vendor_b, "Pot", dec!(7.00)).await;
    ctx.add_to_cart(&shopper, p1, 1).await;
    ctx.add_to_cart(&shopper, p2, 1).await;
    let placed = ctx.services.orders.place_order(&shopper).await.unwrap();

    let line_a = placed
        .items
        .iter()
        .find(|i| i.vendor_id == Some(vendor_a.user_id))
        .unwrap();

    // Owning vendor can move their line.
    let updated = ctx
        .services
        .orders
        .update_fulfillment(&vendor_a, line_a.id, "shipped")
        .await
        .unwrap();
    assert_eq!(updated.fulfillment_status, FulfillmentStatus::Shipped);

    // The order's own status is untouched by line fulfillment.
    let order_after = ctx
        .services
        .orders
        .get_order(&shopper, placed.order.id)
        .await
        .unwrap();
    assert_eq!(order_after.order.status, OrderStatus::Pending);

    // Unknown status values are invalid input.
    let invalid = ctx
        .services
        .orders
        .update_fulfillment(&vendor_a, line_a.id, "teleported")
        .await;
    assert_matches!(invalid, Err(ServiceError::InvalidInput(_)));

    // Another vendor's line reads as missing.
    let foreign = ctx
        .services
        .orders
        .update_fulfillment(&vendor_b, line_a.id, "shipped")
        .await;
    assert_matches!(foreign, Err(ServiceError::NotFound(_)));

    // Each vendor sees exactly their own lines.
    let a_items = ctx.services.orders.list_vendor_items(&vendor_a).await.unwrap();
    assert_eq!(a_items.len(), 1);
    assert_eq!(a_items[0].product_name.as_deref(), Some("Plant"));
    assert_eq!(a_items[0].buyer_username.as_deref(), Some("shopper_ful"));
}

#[tokio::test]
async fn shipped_orders_still_cannot_be_returned() {
    let ctx = TestContext::new().await;
    let vendor = ctx.register("vendor_shipped", UserRole::Vendor).await;
    let shopper = ctx.register("shopper_shipped", UserRole::User).await;
    let admin = ctx.register("admin_shipped", UserRole::Admin).await;

    let product = ctx.seed_product(&vendor, "Toaster", dec!(45.00)).await;
    ctx.add_to_cart(&shopper, product, 1).await;
    let placed = ctx.services.orders.place_order(&shopper).await.unwrap();

    for status in ["processing", "shipped"] {
        ctx.services
            .orders
            .update_status(&admin, placed.order.id, status)
            .await
            .unwrap();
    }

    let result = ctx
        .services
        .orders
        .return_order(&shopper, placed.order.id, Some("defective".to_string()))
        .await;
    assert_matches!(
        result,
        Err(ServiceError::InvalidOperation(msg)) if msg.contains("not delivered")
    );
}

#[tokio::test]
async fn status_updates_are_admin_only_and_forward_only() {
    let ctx = TestContext::new().await;
    let vendor = ctx.register("vendor_status", UserRole::Vendor).await;
    let shopper = ctx.register("shopper_status", UserRole::User).await;
    let admin = ctx.register("admin_status", UserRole::Admin).await;

    let product = ctx.seed_product(&vendor, "Clock", dec!(22.00)).await;
    ctx.add_to_cart(&shopper, product, 1).await;
    let placed = ctx.services.orders.place_order(&shopper).await.unwrap();

    let not_admin = ctx
        .services
        .orders
        .update_status(&shopper, placed.order.id, "processing")
        .await;
    assert_matches!(not_admin, Err(ServiceError::Forbidden(_)));

    let skip_ahead = ctx
        .services
        .orders
        .update_status(&admin, placed.order.id, "delivered")
        .await;
    assert_matches!(skip_ahead, Err(ServiceError::InvalidOperation(_)));

    let bad_value = ctx
        .services
        .orders
        .update_status(&admin, placed.order.id, "misplaced")
        .await;
    assert_matches!(bad_value, Err(ServiceError::InvalidInput(_)));

    let advanced = ctx
        .services
        .orders
        .update_status(&admin, placed.order.id, "processing")
        .await
        .unwrap();
    assert_eq!(advanced.status, OrderStatus::Processing);
}

#[tokio::test]
async fn order_history_is_scoped_to_the_owner() {
    let ctx = TestContext::new().await;
    let vendor = ctx.register("vendor_hist", UserRole::Vendor).await;
    let alice = ctx.register("shopper_hist_a", UserRole::User).await;
    let bob = ctx.register("shopper_hist_b", UserRole::User).await;

    let product = ctx.seed_product(&vendor, "Notebook", dec!(3.50)).await;
    ctx.add_to_cart(&alice, product, 2).await;
    let placed = ctx.services.orders.place_order(&alice).await.unwrap();

    let alice_orders = ctx.services.orders.list_orders(&alice).await.unwrap();
    assert_eq!(alice_orders.len(), 1);
    assert_eq!(alice_orders[0].items.len(), 1);

    let bob_orders = ctx.services.orders.list_orders(&bob).await.unwrap();
    assert!(bob_orders.is_empty());

    let bob_view = ctx.services.orders.get_order(&bob, placed.order.id).await;
    assert_matches!(bob_view, Err(ServiceError::NotFound(_)));
}
