use crate::handlers::common::{created_response, map_service_error, success_response};
use crate::{auth::AuthUser, errors::ApiError, AppState};
use axum::{
    extract::{Json, Path, State},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for wishlist endpoints.
pub fn wishlists_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_wishlist))
        .route("/add", post(add_to_wishlist))
        .route("/remove/:product_id", post(remove_from_wishlist))
}

#[derive(Debug, Deserialize)]
struct AddWishlistRequest {
    product_id: Uuid,
}

/// List the caller's wishlist with product details.
async fn list_wishlist(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let entries = state
        .services
        .wishlist
        .list(&principal)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(entries))
}

/// Add a product to the caller's wishlist; re-adding is a no-op.
async fn add_to_wishlist(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
    Json(payload): Json<AddWishlistRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .wishlist
        .add(&principal, payload.product_id)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(serde_json::json!({
        "message": "Product added to wishlist"
    })))
}

/// Remove a product from the caller's wishlist.
async fn remove_from_wishlist(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .wishlist
        .remove(&principal, product_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "message": "Product removed from wishlist"
    })))
}
