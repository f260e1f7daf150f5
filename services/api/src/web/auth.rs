//! services/api/src/web/auth.rs
//!
//! Session endpoints for login and logout, plus the password hashing helpers
//! shared with registration.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use newswatcher_core::{validation, PortError, SessionClaim};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::web::middleware::ClientIp;
use crate::web::state::AppState;
use crate::web::{ensure_owner, json_body};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub display_name: String,
    pub user_id: String,
    pub token: String,
    pub msg: String,
}

/// A bare confirmation message.
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub msg: String,
}

impl MessageResponse {
    pub fn new(msg: &str) -> Json<Self> {
        Json(Self {
            msg: msg.to_string(),
        })
    }
}

//=========================================================================================
// Credentials
//=========================================================================================

pub(crate) fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            AppError::Internal("Failed to hash password".to_string())
        })
}

/// Constant-time comparison of `password` against a stored PHC hash string.
pub(crate) fn verify_password(password: &str, stored_hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(stored_hash).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        AppError::Internal("Authentication error".to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/sessions - Login and receive a session token
#[utoipa::path(
    post,
    path = "/api/sessions",
    tag = "sessions",
    request_body = LoginRequest,
    responses(
        (status = 201, description = "Login successful", body = LoginResponse),
        (status = 406, description = "Invalid email or password format"),
        (status = 407, description = "Email not registered"),
        (status = 408, description = "Wrong password")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    ClientIp(session_ip): ClientIp,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    // 1. Validate before touching the store
    let req = json_body(payload)?;
    validation::validate_login(&req.email, &req.password).map_err(|_| {
        AppError::InvalidInput(
            "Invalid field: password 7 to 15 (one number, one special character)".to_string(),
        )
    })?;

    // 2. Get user by email
    let user_creds = match state.db.get_user_by_email(&req.email).await {
        Ok(creds) => creds,
        Err(PortError::NotFound(_)) => return Err(AppError::UserNotFound),
        Err(e) => return Err(e.into()),
    };

    // 3. Verify password
    if !verify_password(&req.password, &user_creds.hashed_password)? {
        return Err(AppError::WrongPassword);
    }

    // 4. Mint and sign the session claim
    let session_ua = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let token = state
        .tokens
        .claim_for(
            user_creds.user_id.to_string(),
            user_creds.display_name.clone(),
            session_ip,
            session_ua,
        )
        .and_then(|claim| state.tokens.sign(&claim))
        .map_err(|e| {
            error!("Failed to sign session token: {:?}", e);
            AppError::Internal("Failed to create session".to_string())
        })?;

    info!(user_id = %user_creds.user_id, "User logged in");
    let response = LoginResponse {
        display_name: user_creds.display_name,
        user_id: user_creds.user_id.to_string(),
        token,
        msg: "Authorized".to_string(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// DELETE /api/sessions/{userId} - Logout
///
/// Tokens are not revoked server-side; they stay valid until they expire.
#[utoipa::path(
    delete,
    path = "/api/sessions/{userId}",
    tag = "sessions",
    params(("userId" = String, Path, description = "The id of the logged in user")),
    responses(
        (status = 200, description = "Logout successful", body = MessageResponse),
        (status = 401, description = "No valid session token"),
        (status = 407, description = "Invalid user id")
    ),
    security(("x-auth" = []))
)]
pub async fn logout_handler(
    Extension(claim): Extension<SessionClaim>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    ensure_owner(&claim, &user_id, "logout")?;
    info!(user_id = %user_id, "User logged out");
    Ok((StatusCode::OK, MessageResponse::new("Logged out")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("abc123!x").unwrap();
        assert!(verify_password("abc123!x", &hash).unwrap());
        assert!(!verify_password("abc123!y", &hash).unwrap());
    }

    #[test]
    fn corrupt_hash_is_an_internal_error() {
        assert!(matches!(
            verify_password("abc123!x", "not-a-hash"),
            Err(AppError::Internal(_))
        ));
    }
}
