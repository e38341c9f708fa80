use crate::handlers::common::{created_response, map_service_error, success_response};
use crate::{auth::AuthUser, errors::ApiError, AppState};
use axum::{
    extract::{Json, Path, State},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

/// Creates the router for shopper-facing order endpoints.
pub fn orders_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_orders))
        .route("/place", post(place_order))
        .route("/:id", get(get_order))
        .route("/:id/checkout", post(checkout_order))
        .route("/:id/cancel", post(cancel_order))
        .route("/:id/return", post(return_order))
        .route("/:id/status", put(update_order_status))
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReasonRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

/// Convert the caller's cart into an order
#[utoipa::path(
    post,
    path = "/api/v1/orders/place",
    summary = "Place order",
    description = "Atomically converts the caller's cart into a priced order with one line per cart row, then clears the cart",
    responses(
        (status = 201, description = "Order created with its items"),
        (status = 400, description = "Cart is empty", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn place_order(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let placed = state
        .services
        .orders
        .place_order(&principal)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(placed))
}

/// List the caller's orders
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    responses(
        (status = 200, description = "Orders with their items, newest first"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let orders = state
        .services
        .orders
        .list_orders(&principal)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(orders))
}

/// Fetch one of the caller's orders
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with its items"),
        (status = 404, description = "Not found or not owned", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let found = state
        .services
        .orders
        .get_order(&principal, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(found))
}

/// Capture payment for an order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/checkout",
    summary = "Checkout order",
    description = "Marks the order paid and notifies the buyer and each vendor once; calling it again is a no-op",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Payment captured (or already captured)"),
        (status = 404, description = "Not found or not owned", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn checkout_order(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let outcome = state
        .services
        .orders
        .checkout(&principal, id)
        .await
        .map_err(map_service_error)?;

    let message = if outcome.already_paid {
        "Order is already paid"
    } else {
        "Payment successful; buyer and vendors notified"
    };

    Ok(success_response(serde_json::json!({
        "message": message,
        "order_id": outcome.order.id,
        "payment_status": outcome.order.payment_status,
    })))
}

/// Cancel an order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    summary = "Cancel order",
    request_body = ReasonRequest,
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order cancelled"),
        (status = 400, description = "Already cancelled or delivered", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found or not owned", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReasonRequest>>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let reason = payload.and_then(|Json(body)| body.reason);
    let cancelled = state
        .services
        .orders
        .cancel_order(&principal, id, reason)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "message": "Order cancelled successfully",
        "order": cancelled,
    })))
}

/// Request a return for a delivered order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/return",
    summary = "Return order",
    request_body = ReasonRequest,
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Return recorded"),
        (status = 400, description = "Not delivered yet or already returned", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found or not owned", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn return_order(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReasonRequest>>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let reason = payload.and_then(|Json(body)| body.reason);
    let returned = state
        .services
        .orders
        .return_order(&principal, id, reason)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "message": "Return request successful",
        "order": returned,
    })))
}

/// Advance an order's shipping status (admin)
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    summary = "Update order status",
    request_body = UpdateOrderStatusRequest,
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Status advanced"),
        (status = 400, description = "Invalid transition or status value", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not an administrator", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_order_status(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let updated = state
        .services
        .orders
        .update_status(&principal, id, &payload.status)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(updated))
}
