use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::{
        cart_item::{self, Entity as CartItemEntity},
        order::{self, Entity as OrderEntity, OrderStatus, PaymentStatus},
        order_item::{self, Entity as OrderItemEntity, FulfillmentStatus},
        product::{self, Entity as ProductEntity},
        user::{self, Entity as UserEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    notifications::Mailer,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, QuerySelect,
    Set, TransactionTrait,
};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// An order together with its line items.
#[derive(Debug, Serialize)]
pub struct OrderWithItems {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// Result of a checkout call. `already_paid` marks the idempotent path:
/// the order was paid before and no notifications were sent again.
#[derive(Debug, Serialize)]
pub struct CheckoutOutcome {
    pub order: order::Model,
    pub already_paid: bool,
}

/// Vendor-facing view of one order line.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct VendorOrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub buyer_username: Option<String>,
    pub product_name: Option<String>,
    pub quantity: i32,
    pub price: Decimal,
    pub fulfillment_status: FulfillmentStatus,
}

/// Sum of line totals at the snapshotted unit prices. An order's total is
/// fixed to this value at placement and never recomputed.
fn compute_total<I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = (Decimal, i32)>,
{
    lines
        .into_iter()
        .map(|(price, quantity)| price * Decimal::from(quantity))
        .sum()
}

/// Delivered orders go through the return flow; everything else may cancel
/// exactly once.
fn ensure_cancellable(order: &order::Model) -> Result<(), ServiceError> {
    if order.status == OrderStatus::Delivered {
        return Err(ServiceError::InvalidOperation(
            "Order already delivered, please request a return instead".to_string(),
        ));
    }
    if order.is_cancelled {
        return Err(ServiceError::InvalidOperation(
            "Order is already cancelled".to_string(),
        ));
    }
    Ok(())
}

/// Returns are only open to delivered orders, exactly once.
fn ensure_returnable(order: &order::Model) -> Result<(), ServiceError> {
    if order.status != OrderStatus::Delivered {
        return Err(ServiceError::InvalidOperation(
            "Order not delivered yet, cannot return".to_string(),
        ));
    }
    if order.is_returned {
        return Err(ServiceError::InvalidOperation(
            "Order is already returned".to_string(),
        ));
    }
    Ok(())
}

/// Forward fulfillment progression; cancelled and returned are reached only
/// through their dedicated flows.
fn ensure_forward_transition(from: OrderStatus, to: OrderStatus) -> Result<(), ServiceError> {
    let allowed = matches!(
        (from, to),
        (OrderStatus::Pending, OrderStatus::Processing)
            | (OrderStatus::Processing, OrderStatus::Shipped)
            | (OrderStatus::Shipped, OrderStatus::Delivered)
    );
    if allowed {
        Ok(())
    } else {
        Err(ServiceError::InvalidOperation(format!(
            "Cannot move order from {} to {}",
            from, to
        )))
    }
}

/// Order lifecycle: cart conversion, checkout, cancellation, returns and
/// per-line fulfillment tracking.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    mailer: Arc<dyn Mailer>,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            db,
            event_sender,
            mailer,
        }
    }

    /// Converts the caller's cart into an order.
    ///
    /// Runs as one transaction: the cart rows are read under an exclusive
    /// lock (a second concurrent placement waits and then finds the cart
    /// empty), each line is snapshotted at the current catalog price with
    /// its vendor, the order and items are inserted, and the cart rows are
    /// deleted. Any failure rolls the whole conversion back.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn place_order(&self, principal: &AuthUser) -> Result<OrderWithItems, ServiceError> {
        let txn = self.db.begin().await?;

        let cart_rows = CartItemEntity::find()
            .filter(cart_item::Column::UserId.eq(principal.user_id))
            .lock_exclusive()
            .all(&txn)
            .await?;

        if cart_rows.is_empty() {
            return Err(ServiceError::InvalidOperation("Cart is empty".to_string()));
        }

        let mut lines: Vec<(cart_item::Model, product::Model)> =
            Vec::with_capacity(cart_rows.len());
        for row in cart_rows {
            let item_product = ProductEntity::find_by_id(row.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::InvalidOperation(
                        "A product in the cart no longer exists".to_string(),
                    )
                })?;
            lines.push((row, item_product));
        }

        let total = compute_total(lines.iter().map(|(row, p)| (p.price, row.quantity)));

        let order_id = Uuid::new_v4();
        let placed = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(principal.user_id),
            status: Set(OrderStatus::Pending),
            payment_status: Set(PaymentStatus::Pending),
            total: Set(total),
            is_cancelled: Set(false),
            is_returned: Set(false),
            cancel_reason: Set(None),
            return_reason: Set(None),
            created_at: Set(Utc::now()),
            version: Set(1),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for (row, item_product) in &lines {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(Some(item_product.id)),
                vendor_id: Set(Some(item_product.vendor_id)),
                quantity: Set(row.quantity),
                price: Set(item_product.price),
                fulfillment_status: Set(FulfillmentStatus::Pending),
            };
            items.push(item.insert(&txn).await?);
        }

        CartItemEntity::delete_many()
            .filter(cart_item::Column::UserId.eq(principal.user_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderPlaced(order_id))
            .await;

        info!(order_id = %order_id, total = %placed.total, "Order placed");
        Ok(OrderWithItems {
            order: placed,
            items,
        })
    }

    /// Lists the caller's orders with items, newest first.
    pub async fn list_orders(
        &self,
        principal: &AuthUser,
    ) -> Result<Vec<OrderWithItems>, ServiceError> {
        let rows = OrderEntity::find()
            .filter(order::Column::UserId.eq(principal.user_id))
            .order_by_desc(order::Column::CreatedAt)
            .find_with_related(OrderItemEntity)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(model, items)| OrderWithItems {
                order: model,
                items,
            })
            .collect())
    }

    /// Fetches one of the caller's orders. An order owned by someone else
    /// is indistinguishable from a missing one.
    pub async fn get_order(
        &self,
        principal: &AuthUser,
        order_id: Uuid,
    ) -> Result<OrderWithItems, ServiceError> {
        let model = OrderEntity::find_by_id(order_id)
            .filter(order::Column::UserId.eq(principal.user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        let items = model.find_related(OrderItemEntity).all(&*self.db).await?;
        Ok(OrderWithItems {
            order: model,
            items,
        })
    }

    /// Captures payment for an order.
    ///
    /// Idempotent: a paid order returns success without touching the row or
    /// re-sending mail. The precondition check and the write share one
    /// transaction with the row locked, so two concurrent checkouts cannot
    /// both take the unpaid path. Notifications go out after commit and are
    /// best-effort; payment success is the durable fact.
    #[instrument(skip(self, principal), fields(order_id = %order_id))]
    pub async fn checkout(
        &self,
        principal: &AuthUser,
        order_id: Uuid,
    ) -> Result<CheckoutOutcome, ServiceError> {
        let txn = self.db.begin().await?;

        let model = OrderEntity::find_by_id(order_id)
            .filter(order::Column::UserId.eq(principal.user_id))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        if model.payment_status == PaymentStatus::Paid {
            txn.commit().await?;
            info!("Order already paid, skipping capture");
            return Ok(CheckoutOutcome {
                order: model,
                already_paid: true,
            });
        }

        // A real gateway capture would run here; this service records the
        // payment directly.
        let version = model.version;
        let mut active: order::ActiveModel = model.into();
        active.payment_status = Set(PaymentStatus::Paid);
        active.version = Set(version + 1);
        let updated = active.update(&txn).await?;

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderPaid(order_id))
            .await;

        self.send_checkout_notifications(&updated, &items).await;

        info!("Payment captured");
        Ok(CheckoutOutcome {
            order: updated,
            already_paid: false,
        })
    }

    /// Cancels one of the caller's orders. Delivered orders are rejected
    /// (they go through the return flow), as is a second cancel.
    #[instrument(skip(self, principal, reason), fields(order_id = %order_id))]
    pub async fn cancel_order(
        &self,
        principal: &AuthUser,
        order_id: Uuid,
        reason: Option<String>,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let model = OrderEntity::find_by_id(order_id)
            .filter(order::Column::UserId.eq(principal.user_id))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        ensure_cancellable(&model)?;

        let version = model.version;
        let mut active: order::ActiveModel = model.into();
        active.is_cancelled = Set(true);
        active.cancel_reason = Set(Some(reason.unwrap_or_default()));
        active.status = Set(OrderStatus::Cancelled);
        active.version = Set(version + 1);
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCancelled(order_id))
            .await;

        info!("Order cancelled");
        Ok(updated)
    }

    /// Requests a return for one of the caller's delivered orders.
    #[instrument(skip(self, principal, reason), fields(order_id = %order_id))]
    pub async fn return_order(
        &self,
        principal: &AuthUser,
        order_id: Uuid,
        reason: Option<String>,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let model = OrderEntity::find_by_id(order_id)
            .filter(order::Column::UserId.eq(principal.user_id))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        ensure_returnable(&model)?;

        let version = model.version;
        let mut active: order::ActiveModel = model.into();
        active.is_returned = Set(true);
        active.return_reason = Set(Some(reason.unwrap_or_default()));
        active.status = Set(OrderStatus::Returned);
        active.version = Set(version + 1);
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderReturned(order_id))
            .await;

        info!("Order returned");
        Ok(updated)
    }

    /// Advances an order along pending → processing → shipped → delivered.
    /// Admin-only; not derived from item fulfillment, which is tracked
    /// separately per line.
    #[instrument(skip(self, principal), fields(order_id = %order_id))]
    pub async fn update_status(
        &self,
        principal: &AuthUser,
        order_id: Uuid,
        status: &str,
    ) -> Result<order::Model, ServiceError> {
        if !principal.is_admin() {
            return Err(ServiceError::Forbidden(
                "Only administrators may update order status".to_string(),
            ));
        }

        let next = OrderStatus::from_str(status)
            .map_err(|_| ServiceError::InvalidInput(format!("Invalid order status: {}", status)))?;

        let txn = self.db.begin().await?;

        let model = OrderEntity::find_by_id(order_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        ensure_forward_transition(model.status, next)?;

        let version = model.version;
        let mut active: order::ActiveModel = model.into();
        active.status = Set(next);
        active.version = Set(version + 1);
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        info!(status = %next, "Order status updated");
        Ok(updated)
    }

    /// Lists every order line recorded against the calling vendor, newest
    /// order first.
    pub async fn list_vendor_items(
        &self,
        principal: &AuthUser,
    ) -> Result<Vec<VendorOrderItem>, ServiceError> {
        let mut rows = OrderItemEntity::find()
            .filter(order_item::Column::VendorId.eq(principal.user_id))
            .find_also_related(OrderEntity)
            .all(&*self.db)
            .await?;

        rows.sort_by(|a, b| {
            let a_created = a.1.as_ref().map(|o| o.created_at);
            let b_created = b.1.as_ref().map(|o| o.created_at);
            b_created.cmp(&a_created)
        });

        let buyer_ids: BTreeSet<Uuid> = rows
            .iter()
            .filter_map(|(_, order)| order.as_ref().map(|o| o.user_id))
            .collect();
        let buyers: HashMap<Uuid, String> = UserEntity::find()
            .filter(user::Column::Id.is_in(buyer_ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect();

        let product_ids: BTreeSet<Uuid> =
            rows.iter().filter_map(|(item, _)| item.product_id).collect();
        let product_names: HashMap<Uuid, String> = ProductEntity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();

        Ok(rows
            .into_iter()
            .map(|(item, order)| VendorOrderItem {
                id: item.id,
                order_id: item.order_id,
                buyer_username: order
                    .as_ref()
                    .and_then(|o| buyers.get(&o.user_id).cloned()),
                product_name: item
                    .product_id
                    .and_then(|pid| product_names.get(&pid).cloned()),
                quantity: item.quantity,
                price: item.price,
                fulfillment_status: item.fulfillment_status,
            })
            .collect())
    }

    /// Updates the fulfillment status of one line the calling vendor owns.
    /// The status string must name one of the five fulfillment states;
    /// another vendor's line reads as missing.
    #[instrument(skip(self, principal), fields(order_item_id = %order_item_id))]
    pub async fn update_fulfillment(
        &self,
        principal: &AuthUser,
        order_item_id: Uuid,
        status: &str,
    ) -> Result<order_item::Model, ServiceError> {
        let parsed = FulfillmentStatus::from_str(status).map_err(|_| {
            ServiceError::InvalidInput(format!("Invalid fulfillment status: {}", status))
        })?;

        let txn = self.db.begin().await?;

        let item = OrderItemEntity::find_by_id(order_item_id)
            .filter(order_item::Column::VendorId.eq(principal.user_id))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order item not found".to_string()))?;

        let mut active: order_item::ActiveModel = item.into();
        active.fulfillment_status = Set(parsed);
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::FulfillmentUpdated {
                order_item_id,
                status: parsed,
            })
            .await;

        info!(status = %parsed, "Fulfillment status updated");
        Ok(updated)
    }

    /// Emails the buyer and each distinct vendor represented on the order.
    /// Failures are logged; they never affect the committed payment.
    async fn send_checkout_notifications(
        &self,
        order: &order::Model,
        items: &[order_item::Model],
    ) {
        let buyer = match UserEntity::find_by_id(order.user_id).one(&*self.db).await {
            Ok(Some(buyer)) => buyer,
            Ok(None) => {
                warn!(order_id = %order.id, "Buyer account missing, skipping notifications");
                return;
            }
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Failed to load buyer for notifications");
                return;
            }
        };

        let body = format!(
            "Hi {},\n\nYour payment for order #{} was received successfully. \
             We will notify you when your order ships!",
            buyer.name, order.id
        );
        if let Err(e) = self
            .mailer
            .send(&buyer.email, "Your order payment was successful", &body)
            .await
        {
            warn!(order_id = %order.id, error = %e, "Failed to notify buyer");
        }

        let product_ids: BTreeSet<Uuid> = items.iter().filter_map(|i| i.product_id).collect();
        let product_names: HashMap<Uuid, String> = match ProductEntity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(&*self.db)
            .await
        {
            Ok(products) => products.into_iter().map(|p| (p.id, p.name)).collect(),
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Failed to load products for notifications");
                HashMap::new()
            }
        };

        let vendor_ids: BTreeSet<Uuid> = items.iter().filter_map(|i| i.vendor_id).collect();
        for vendor_id in vendor_ids {
            let vendor = match UserEntity::find_by_id(vendor_id).one(&*self.db).await {
                Ok(Some(vendor)) => vendor,
                Ok(None) => continue,
                Err(e) => {
                    warn!(vendor_id = %vendor_id, error = %e, "Failed to load vendor for notification");
                    continue;
                }
            };

            let their_products: Vec<String> = items
                .iter()
                .filter(|i| i.vendor_id == Some(vendor_id))
                .map(|i| {
                    i.product_id
                        .and_then(|pid| product_names.get(&pid).cloned())
                        .unwrap_or_else(|| "a purchased item".to_string())
                })
                .collect();

            let body = format!(
                "Hello {},\n\nA buyer has paid for order #{} including your products: {}. \
                 Please process this order.",
                vendor.name,
                order.id,
                their_products.join(", ")
            );
            if let Err(e) = self
                .mailer
                .send(&vendor.email, "Order placed for your products", &body)
                .await
            {
                warn!(vendor_id = %vendor_id, error = %e, "Failed to notify vendor");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    fn order_fixture(status: OrderStatus) -> order::Model {
        order::Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            status,
            payment_status: PaymentStatus::Pending,
            total: dec!(25.00),
            is_cancelled: false,
            is_returned: false,
            cancel_reason: None,
            return_reason: None,
            created_at: Utc::now(),
            version: 1,
        }
    }

    #[test]
    fn total_sums_price_times_quantity() {
        let total = compute_total(vec![(dec!(10.00), 2), (dec!(5.00), 1)]);
        assert_eq!(total, dec!(25.00));
    }

    #[test]
    fn total_of_no_lines_is_zero() {
        assert_eq!(compute_total(Vec::new()), Decimal::ZERO);
    }

    #[test]
    fn total_keeps_decimal_precision() {
        let total = compute_total(vec![(dec!(19.99), 7), (dec!(0.01), 100)]);
        assert_eq!(total, dec!(140.93));
    }

    #[test_case(OrderStatus::Pending => true)]
    #[test_case(OrderStatus::Processing => true)]
    #[test_case(OrderStatus::Shipped => true)]
    #[test_case(OrderStatus::Delivered => false)]
    fn cancel_allowed_before_delivery(status: OrderStatus) -> bool {
        ensure_cancellable(&order_fixture(status)).is_ok()
    }

    #[test]
    fn second_cancel_is_rejected() {
        let mut model = order_fixture(OrderStatus::Cancelled);
        model.is_cancelled = true;
        assert_matches!(
            ensure_cancellable(&model),
            Err(ServiceError::InvalidOperation(msg)) if msg.contains("already cancelled")
        );
    }

    #[test_case(OrderStatus::Pending => false)]
    #[test_case(OrderStatus::Processing => false)]
    #[test_case(OrderStatus::Shipped => false)]
    #[test_case(OrderStatus::Delivered => true)]
    fn return_requires_delivery(status: OrderStatus) -> bool {
        ensure_returnable(&order_fixture(status)).is_ok()
    }

    #[test]
    fn second_return_is_rejected() {
        let mut model = order_fixture(OrderStatus::Returned);
        model.is_returned = true;
        assert_matches!(
            ensure_returnable(&model),
            Err(ServiceError::InvalidOperation(msg)) if msg.contains("already returned")
        );
    }

    #[test_case(OrderStatus::Pending, OrderStatus::Processing => true)]
    #[test_case(OrderStatus::Processing, OrderStatus::Shipped => true)]
    #[test_case(OrderStatus::Shipped, OrderStatus::Delivered => true)]
    #[test_case(OrderStatus::Pending, OrderStatus::Delivered => false)]
    #[test_case(OrderStatus::Delivered, OrderStatus::Pending => false)]
    #[test_case(OrderStatus::Cancelled, OrderStatus::Processing => false)]
    fn forward_transitions_only(from: OrderStatus, to: OrderStatus) -> bool {
        ensure_forward_transition(from, to).is_ok()
    }

    #[test]
    fn fulfillment_status_parses_all_five_values() {
        for value in ["pending", "processing", "shipped", "delivered", "cancelled"] {
            assert!(FulfillmentStatus::from_str(value).is_ok(), "{}", value);
        }
        assert!(FulfillmentStatus::from_str("teleported").is_err());
        assert!(FulfillmentStatus::from_str("Shipped ").is_err());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn lines() -> impl Strategy<Value = Vec<(Decimal, i32)>> {
            prop::collection::vec(
                (0u64..100_000u64, 1i32..100i32)
                    .prop_map(|(cents, qty)| (Decimal::new(cents as i64, 2), qty)),
                0..20,
            )
        }

        proptest! {
            #[test]
            fn total_matches_manual_sum(cart in lines()) {
                let expected = cart
                    .iter()
                    .fold(Decimal::ZERO, |acc, (price, qty)| {
                        acc + *price * Decimal::from(*qty)
                    });
                prop_assert_eq!(compute_total(cart), expected);
            }

            #[test]
            fn total_is_additive_over_cart_splits(
                first in lines(),
                second in lines(),
            ) {
                let combined: Vec<_> =
                    first.iter().chain(second.iter()).copied().collect();
                prop_assert_eq!(
                    compute_total(combined),
                    compute_total(first) + compute_total(second)
                );
            }
        }
    }
}
