use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::{
        product::{self, Entity as ProductEntity},
        user,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub available: Option<bool>,
}

fn ensure_non_negative_price(price: Decimal) -> Result<(), ServiceError> {
    if price < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Price must not be negative".to_string(),
        ));
    }
    Ok(())
}

/// Shopper-facing product view; hides the vendor id, shows the vendor name.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PublicProduct {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub vendor_name: Option<String>,
}

impl PublicProduct {
    fn from_joined(model: product::Model, vendor: Option<user::Model>) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            price: model.price,
            available: model.available,
            created_at: model.created_at,
            vendor_name: vendor.map(|v| v.name),
        }
    }
}

/// Vendor catalog management and the public storefront listing.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl CatalogService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Creates a product owned by the calling vendor.
    #[instrument(skip(self, input), fields(vendor_id = %principal.user_id))]
    pub async fn create_product(
        &self,
        principal: &AuthUser,
        input: CreateProductInput,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;
        ensure_non_negative_price(input.price)?;

        let product_id = Uuid::new_v4();
        let model = product::ActiveModel {
            id: Set(product_id),
            vendor_id: Set(principal.user_id),
            name: Set(input.name),
            description: Set(input.description),
            price: Set(input.price),
            available: Set(input.available),
            created_at: Set(Utc::now()),
        };

        let created = model.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductCreated(product_id))
            .await;

        info!(product_id = %product_id, "Product created");
        Ok(created)
    }

    /// Lists the calling vendor's own products, newest first.
    pub async fn list_vendor_products(
        &self,
        principal: &AuthUser,
    ) -> Result<Vec<product::Model>, ServiceError> {
        let products = ProductEntity::find()
            .filter(product::Column::VendorId.eq(principal.user_id))
            .order_by_desc(product::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(products)
    }

    /// Fetches one of the calling vendor's products. Another vendor's
    /// product is indistinguishable from a missing one.
    pub async fn get_vendor_product(
        &self,
        principal: &AuthUser,
        product_id: Uuid,
    ) -> Result<product::Model, ServiceError> {
        ProductEntity::find_by_id(product_id)
            .filter(product::Column::VendorId.eq(principal.user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))
    }

    /// Applies a partial update to one of the calling vendor's products.
    #[instrument(skip(self, input), fields(product_id = %product_id))]
    pub async fn update_product(
        &self,
        principal: &AuthUser,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;
        if let Some(price) = input.price {
            ensure_non_negative_price(price)?;
        }

        let existing = self.get_vendor_product(principal, product_id).await?;

        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(available) = input.available {
            active.available = Set(available);
        }

        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(product_id))
            .await;

        Ok(updated)
    }

    /// Deletes one of the calling vendor's products. Order items that
    /// reference it keep their snapshot and lose only the link.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn delete_product(
        &self,
        principal: &AuthUser,
        product_id: Uuid,
    ) -> Result<(), ServiceError> {
        let existing = self.get_vendor_product(principal, product_id).await?;
        existing.delete(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductDeleted(product_id))
            .await;

        info!(product_id = %product_id, "Product deleted");
        Ok(())
    }

    /// Public storefront listing: available products only, optional
    /// name substring search, paginated.
    pub async fn list_public(
        &self,
        search: Option<&str>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<PublicProduct>, u64), ServiceError> {
        let mut query = ProductEntity::find().filter(product::Column::Available.eq(true));

        if let Some(term) = search {
            let term = term.trim();
            if !term.is_empty() {
                query = query.filter(product::Column::Name.contains(term));
            }
        }

        let paginator = query
            .order_by_desc(product::Column::CreatedAt)
            .find_also_related(user::Entity)
            .paginate(&*self.db, per_page.max(1));

        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.saturating_sub(1)).await?;

        let products = rows
            .into_iter()
            .map(|(model, vendor)| PublicProduct::from_joined(model, vendor))
            .collect();

        Ok((products, total))
    }

    /// Public product detail; unavailable products are hidden.
    pub async fn get_public(&self, product_id: Uuid) -> Result<PublicProduct, ServiceError> {
        let row = ProductEntity::find_by_id(product_id)
            .filter(product::Column::Available.eq(true))
            .find_also_related(user::Entity)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

        Ok(PublicProduct::from_joined(row.0, row.1))
    }
}
