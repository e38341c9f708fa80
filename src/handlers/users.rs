use crate::handlers::common::{map_service_error, success_response};
use crate::{
    auth::AuthUser,
    errors::ApiError,
    services::accounts::{ChangePasswordInput, UpdateProfileInput},
    AppState,
};
use axum::{
    extract::{Json, State},
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

/// Creates the router for profile endpoints.
pub fn users_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/profile", get(get_profile))
        .route("/profile", put(update_profile))
        .route("/change-password", post(change_password))
}

/// Fetch the caller's profile.
async fn get_profile(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let profile = state
        .services
        .accounts
        .profile(principal.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(profile))
}

/// Update the caller's name or phone.
async fn update_profile(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
    Json(payload): Json<UpdateProfileInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let profile = state
        .services
        .accounts
        .update_profile(principal.user_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(profile))
}

/// Change the caller's password after verifying the current one.
async fn change_password(
    State(state): State<Arc<AppState>>,
    principal: AuthUser,
    Json(payload): Json<ChangePasswordInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .accounts
        .change_password(principal.user_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "message": "Password updated successfully"
    })))
}
