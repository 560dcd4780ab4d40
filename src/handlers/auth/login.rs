use axum::{extract::State, response::Json};
use serde_json::Value;

use crate::app::AppState;
use crate::auth;
use crate::error::ApiError;
use crate::types::{AuthResponse, LoginRequest};

/// POST /api/auth/login
///
/// The only ungated route. Verifies the trimmed credentials against the
/// credential store and issues a fresh token pair. Unknown email and
/// wrong password produce the same 401 body.
pub async fn post(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<AuthResponse>, ApiError> {
    let request: LoginRequest = serde_json::from_value(payload)
        .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))?;

    let email = request.email.trim();
    let password = request.password.trim();
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::invalid_credentials());
    }

    let credential = state
        .credentials
        .find_by_email(email)
        .await?
        .ok_or_else(ApiError::invalid_credentials)?;

    if !auth::verify_password(password, &credential.password_hash) {
        return Err(ApiError::invalid_credentials());
    }

    let token = auth::issue_token(&credential)?;
    let refresh_token = auth::issue_refresh_token(&credential)?;
    tracing::info!(email = %credential.email, "login succeeded");

    Ok(Json(AuthResponse {
        user: credential.to_user(),
        token,
        refresh_token,
    }))
}
