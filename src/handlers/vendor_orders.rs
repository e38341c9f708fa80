use crate::handlers::common::{map_service_error, success_response};
use crate::{auth::AuthUser, entities::user::UserRole, errors::ApiError, AppState};
use axum::{
    extract::{Json, Path, State},
    routing::{get, patch},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

/// Creates the router for vendor fulfillment endpoints.
pub fn vendor_orders_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_vendor_order_items))
        .route("/:id", patch(update_fulfillment_status))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateFulfillmentRequest {
    pub fulfillment_status: String,
}

/// List order lines recorded against the calling vendor
#[utoipa::path(
    get,
    path = "/api/v1/vendor/order-items",
    summary = "List vendor order items",
    responses(
        (status = 200, description = "Order lines for this vendor, newest order first"),
        (status = 403, description = "Caller is not a vendor", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_vendor_order_items(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    principal.require_role(UserRole::Vendor)?;

    let items = state
        .services
        .orders
        .list_vendor_items(&principal)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(items))
}

/// Update the fulfillment status of one vendor-owned line
#[utoipa::path(
    patch,
    path = "/api/v1/vendor/order-items/{id}",
    summary = "Update fulfillment status",
    request_body = UpdateFulfillmentRequest,
    params(("id" = Uuid, Path, description = "Order item id")),
    responses(
        (status = 200, description = "Fulfillment status updated"),
        (status = 400, description = "Unknown fulfillment status value", body = crate::errors::ErrorResponse),
        (status = 403, description = "Caller is not a vendor", body = crate::errors::ErrorResponse),
        (status = 404, description = "No such line for this vendor", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_fulfillment_status(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateFulfillmentRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    principal.require_role(UserRole::Vendor)?;

    let updated = state
        .services
        .orders
        .update_fulfillment(&principal, id, &payload.fulfillment_status)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(updated))
}
