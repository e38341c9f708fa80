use crate::handlers::common::{
    created_response, map_service_error, success_response, validate_input,
};
use crate::{
    auth::AuthUser, errors::ApiError, services::carts::AddToCartInput, AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for cart endpoints.
pub fn carts_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_cart))
        .route("/add", post(add_to_cart))
        .route("/remove/:product_id", post(remove_from_cart))
}

/// List the caller's cart with product details.
async fn list_cart(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let entries = state
        .services
        .cart
        .list(&principal)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(entries))
}

/// Add a product to the caller's cart (upserts quantity).
async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
    Json(payload): Json<AddToCartInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    state
        .services
        .cart
        .add(&principal, payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(serde_json::json!({
        "message": "Product added to cart"
    })))
}

/// Remove a product line from the caller's cart.
async fn remove_from_cart(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .cart
        .remove(&principal, product_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "message": "Product removed from cart"
    })))
}
