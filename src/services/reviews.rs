use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::{
        order,
        order_item::{self, Entity as OrderItemEntity},
        product::{self, Entity as ProductEntity},
        review::{self, Entity as ReviewEntity},
        user,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, JoinType, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewInput {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i16,
    #[serde(default)]
    pub comment: String,
}

/// Review joined with the reviewer's display name.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ReviewResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_name: Option<String>,
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewResponse {
    fn from_joined(model: review::Model, reviewer: Option<user::Model>) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            user_name: reviewer.map(|u| u.name),
            rating: model.rating,
            comment: model.comment,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Product reviews, gated on a prior purchase of the product.
#[derive(Clone)]
pub struct ReviewService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ReviewService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    async fn available_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        ProductEntity::find_by_id(product_id)
            .filter(product::Column::Available.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))
    }

    /// True when one of the user's orders contains a line for this product.
    async fn has_purchased(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, ServiceError> {
        let count = OrderItemEntity::find()
            .filter(order_item::Column::ProductId.eq(product_id))
            .join(JoinType::InnerJoin, order_item::Relation::Order.def())
            .filter(order::Column::UserId.eq(user_id))
            .count(&*self.db)
            .await?;
        Ok(count > 0)
    }

    /// Lists reviews for an available product, newest first.
    pub async fn list_for_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<ReviewResponse>, ServiceError> {
        let item_product = self.available_product(product_id).await?;

        let rows = ReviewEntity::find()
            .filter(review::Column::ProductId.eq(item_product.id))
            .order_by_desc(review::Column::CreatedAt)
            .find_also_related(user::Entity)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(model, reviewer)| ReviewResponse::from_joined(model, reviewer))
            .collect())
    }

    /// Creates a review. The caller must have purchased the product and may
    /// review it only once.
    #[instrument(skip(self, principal, input), fields(product_id = %product_id, user_id = %principal.user_id))]
    pub async fn create(
        &self,
        principal: &AuthUser,
        product_id: Uuid,
        input: ReviewInput,
    ) -> Result<ReviewResponse, ServiceError> {
        input.validate().map_err(|e| {
            ServiceError::InvalidInput(e.to_string())
        })?;

        let item_product = self.available_product(product_id).await?;

        if !self.has_purchased(principal.user_id, item_product.id).await? {
            return Err(ServiceError::Forbidden(
                "You must purchase this product before reviewing".to_string(),
            ));
        }

        let existing = ReviewEntity::find()
            .filter(review::Column::ProductId.eq(item_product.id))
            .filter(review::Column::UserId.eq(principal.user_id))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::InvalidOperation(
                "You have already reviewed this product".to_string(),
            ));
        }

        let now = Utc::now();
        let model = review::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(item_product.id),
            user_id: Set(principal.user_id),
            rating: Set(input.rating),
            comment: Set(input.comment),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ReviewCreated(created.id))
            .await;

        info!(review_id = %created.id, "Review created");
        Ok(ReviewResponse {
            user_name: Some(principal.name.clone()),
            id: created.id,
            product_id: created.product_id,
            rating: created.rating,
            comment: created.comment,
            created_at: created.created_at,
            updated_at: created.updated_at,
        })
    }

    /// Updates the caller's own review.
    #[instrument(skip(self, principal, input), fields(review_id = %review_id))]
    pub async fn update(
        &self,
        principal: &AuthUser,
        product_id: Uuid,
        review_id: Uuid,
        input: ReviewInput,
    ) -> Result<ReviewResponse, ServiceError> {
        input.validate().map_err(|e| {
            ServiceError::InvalidInput(e.to_string())
        })?;

        let model = ReviewEntity::find_by_id(review_id)
            .filter(review::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Review not found".to_string()))?;

        if model.user_id != principal.user_id {
            return Err(ServiceError::Forbidden("Permission denied".to_string()));
        }

        let mut active: review::ActiveModel = model.into();
        active.rating = Set(input.rating);
        active.comment = Set(input.comment);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ReviewUpdated(review_id))
            .await;

        Ok(ReviewResponse {
            user_name: Some(principal.name.clone()),
            id: updated.id,
            product_id: updated.product_id,
            rating: updated.rating,
            comment: updated.comment,
            created_at: updated.created_at,
            updated_at: updated.updated_at,
        })
    }

    /// Deletes the caller's own review.
    #[instrument(skip(self, principal), fields(review_id = %review_id))]
    pub async fn delete(
        &self,
        principal: &AuthUser,
        product_id: Uuid,
        review_id: Uuid,
    ) -> Result<(), ServiceError> {
        let model = ReviewEntity::find_by_id(review_id)
            .filter(review::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Review not found".to_string()))?;

        if model.user_id != principal.user_id {
            return Err(ServiceError::Forbidden("Permission denied".to_string()));
        }

        model.delete(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ReviewDeleted(review_id))
            .await;

        Ok(())
    }
}
