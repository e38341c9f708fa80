use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response,
};
use crate::{auth::AuthUser, errors::ApiError, services::reviews::ReviewInput, AppState};
use axum::{
    extract::{Json, Path, State},
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for product reviews. Listing is public; writing
/// requires an authenticated purchaser.
pub fn reviews_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:id/reviews", get(list_reviews))
        .route("/:id/reviews", post(create_review))
        .route("/:id/reviews/:review_id", put(update_review))
        .route("/:id/reviews/:review_id", delete(delete_review))
}

/// List reviews for an available product, newest first.
async fn list_reviews(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let reviews = state
        .services
        .reviews
        .list_for_product(product_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(reviews))
}

/// Create a review; the caller must have purchased the product.
async fn create_review(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<ReviewInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let created = state
        .services
        .reviews
        .create(&principal, product_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(created))
}

/// Update the caller's own review.
async fn update_review(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
    Path((product_id, review_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ReviewInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let updated = state
        .services
        .reviews
        .update(&principal, product_id, review_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(updated))
}

/// Delete the caller's own review.
async fn delete_review(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
    Path((product_id, review_id)): Path<(Uuid, Uuid)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .reviews
        .delete(&principal, product_id, review_id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}
