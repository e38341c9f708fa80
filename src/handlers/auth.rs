use crate::handlers::common::{created_response, map_service_error, success_response};
use crate::{
    auth::AccessToken,
    errors::ApiError,
    services::accounts::{AccountResponse, RegisterInput},
    AppState,
};
use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Creates the router for registration and login.
pub fn auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    user: AccountResponse,
    #[serde(flatten)]
    token: AccessToken,
}

/// Register a new account.
async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let account = state
        .services
        .accounts
        .register(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(account))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Verify credentials and issue an access token.
async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (user, token) = state
        .services
        .accounts
        .login(&payload.username, &payload.password)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(LoginResponse { user, token }))
}
