use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::{
        cart_item::{self, Entity as CartItemEntity},
        product::{self, Entity as ProductEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct AddToCartInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

/// Cart line joined with its current catalog entry.
#[derive(Debug, Serialize)]
pub struct CartEntry {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub product: Option<product::Model>,
}

/// Per-user mutable cart. Rows are consumed by order placement.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Lists the caller's cart with product details.
    pub async fn list(&self, principal: &AuthUser) -> Result<Vec<CartEntry>, ServiceError> {
        let rows = CartItemEntity::find()
            .filter(cart_item::Column::UserId.eq(principal.user_id))
            .find_also_related(ProductEntity)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(item, product)| CartEntry {
                id: item.id,
                product_id: item.product_id,
                quantity: item.quantity,
                product,
            })
            .collect())
    }

    /// Adds a product to the caller's cart. An existing (user, product) row
    /// has its quantity incremented instead of creating a duplicate.
    #[instrument(skip(self), fields(user_id = %principal.user_id, product_id = %input.product_id))]
    pub async fn add(
        &self,
        principal: &AuthUser,
        input: AddToCartInput,
    ) -> Result<cart_item::Model, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;

        let product = ProductEntity::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

        let existing = CartItemEntity::find()
            .filter(cart_item::Column::UserId.eq(principal.user_id))
            .filter(cart_item::Column::ProductId.eq(product.id))
            .one(&txn)
            .await?;

        let row = if let Some(item) = existing {
            let new_quantity = item.quantity + input.quantity;
            let mut active: cart_item::ActiveModel = item.into();
            active.quantity = Set(new_quantity);
            active.update(&txn).await?
        } else {
            let item = cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(principal.user_id),
                product_id: Set(product.id),
                quantity: Set(input.quantity),
            };
            item.insert(&txn).await?
        };

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                user_id: principal.user_id,
                product_id: product.id,
            })
            .await;

        info!("Product added to cart");
        Ok(row)
    }

    /// Removes one product line from the caller's cart.
    #[instrument(skip(self), fields(user_id = %principal.user_id, product_id = %product_id))]
    pub async fn remove(
        &self,
        principal: &AuthUser,
        product_id: Uuid,
    ) -> Result<(), ServiceError> {
        let item = CartItemEntity::find()
            .filter(cart_item::Column::UserId.eq(principal.user_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart item not found".to_string()))?;

        item.delete(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                user_id: principal.user_id,
                product_id,
            })
            .await;

        Ok(())
    }
}
