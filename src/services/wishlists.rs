use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::{
        product::{self, Entity as ProductEntity},
        wishlist_item::{self, Entity as WishlistItemEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Wishlist line joined with its current catalog entry.
#[derive(Debug, Serialize)]
pub struct WishlistEntry {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product: Option<product::Model>,
}

#[derive(Clone)]
pub struct WishlistService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl WishlistService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    pub async fn list(&self, principal: &AuthUser) -> Result<Vec<WishlistEntry>, ServiceError> {
        let rows = WishlistItemEntity::find()
            .filter(wishlist_item::Column::UserId.eq(principal.user_id))
            .find_also_related(ProductEntity)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(item, product)| WishlistEntry {
                id: item.id,
                product_id: item.product_id,
                product,
            })
            .collect())
    }

    /// Adds a product to the wishlist. Re-adding an already wished product
    /// is a no-op.
    #[instrument(skip(self), fields(user_id = %principal.user_id, product_id = %product_id))]
    pub async fn add(
        &self,
        principal: &AuthUser,
        product_id: Uuid,
    ) -> Result<wishlist_item::Model, ServiceError> {
        let product = ProductEntity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

        let existing = WishlistItemEntity::find()
            .filter(wishlist_item::Column::UserId.eq(principal.user_id))
            .filter(wishlist_item::Column::ProductId.eq(product.id))
            .one(&*self.db)
            .await?;
        if let Some(item) = existing {
            return Ok(item);
        }

        let item = wishlist_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(principal.user_id),
            product_id: Set(product.id),
        };
        let created = item.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::WishlistItemAdded {
                user_id: principal.user_id,
                product_id,
            })
            .await;

        Ok(created)
    }

    #[instrument(skip(self), fields(user_id = %principal.user_id, product_id = %product_id))]
    pub async fn remove(
        &self,
        principal: &AuthUser,
        product_id: Uuid,
    ) -> Result<(), ServiceError> {
        let item = WishlistItemEntity::find()
            .filter(wishlist_item::Column::UserId.eq(principal.user_id))
            .filter(wishlist_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Wishlist item not found".to_string()))?;

        item.delete(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::WishlistItemRemoved {
                user_id: principal.user_id,
                product_id,
            })
            .await;

        Ok(())
    }
}
