use axum::{extract::State, response::Json, Extension};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::types::User;

/// GET /api/auth/me - the principal behind the bearer token
pub async fn me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<User>, ApiError> {
    let credential = state
        .credentials
        .find_by_email(&auth_user.email)
        .await?
        // Token is valid but the account is gone; treat as unauthenticated
        .ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;

    Ok(Json(credential.to_user()))
}

/// POST /api/auth/logout
///
/// No server-side token registry exists, so this is an acknowledgement;
/// the client discards its copy of the token.
pub async fn logout() -> Json<Value> {
    Json(json!({ "message": "Logged out successfully" }))
}
