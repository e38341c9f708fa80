use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    PaginatedResponse,
};
use crate::{
    auth::AuthUser,
    entities::user::UserRole,
    errors::ApiError,
    services::catalog::{CreateProductInput, UpdateProductInput},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for vendor catalog management.
pub fn vendor_products_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_vendor_products))
        .route("/", post(create_product))
        .route("/:id", get(get_vendor_product))
        .route("/:id", put(update_product))
        .route("/:id", delete(delete_product))
}

/// Creates the router for the public storefront.
pub fn public_products_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_public_products))
        .route("/:id", get(get_public_product))
}

/// List the calling vendor's products.
async fn list_vendor_products(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    principal.require_role(UserRole::Vendor)?;

    let products = state
        .services
        .catalog
        .list_vendor_products(&principal)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(products))
}

/// Create a product owned by the calling vendor.
async fn create_product(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
    Json(payload): Json<CreateProductInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    principal.require_role(UserRole::Vendor)?;
    validate_input(&payload)?;

    let created = state
        .services
        .catalog
        .create_product(&principal, payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(created))
}

/// Fetch one of the calling vendor's products.
async fn get_vendor_product(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    principal.require_role(UserRole::Vendor)?;

    let found = state
        .services
        .catalog
        .get_vendor_product(&principal, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(found))
}

/// Apply a partial update to one of the calling vendor's products.
async fn update_product(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    principal.require_role(UserRole::Vendor)?;
    validate_input(&payload)?;

    let updated = state
        .services
        .catalog
        .update_product(&principal, id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(updated))
}

/// Delete one of the calling vendor's products.
async fn delete_product(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    principal.require_role(UserRole::Vendor)?;

    state
        .services
        .catalog
        .delete_product(&principal, id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}

/// Paginated listing of available products.
async fn list_public_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PublicListQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (products, total) = state
        .services
        .catalog
        .list_public(query.search.as_deref(), query.page, query.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        products,
        query.page,
        query.per_page,
        total,
    )))
}

#[derive(Debug, Deserialize)]
struct PublicListQuery {
    search: Option<String>,
    #[serde(default = "default_page")]
    page: u64,
    #[serde(default = "default_per_page")]
    per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    10
}

/// Detail view of an available product.
async fn get_public_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let found = state
        .services
        .catalog
        .get_public(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(found))
}
