pub mod auth;
pub mod home_news;
pub mod middleware;
pub mod rest;
pub mod shared_news;
pub mod state;
pub mod token;
pub mod users;

use axum::{extract::rejection::JsonRejection, http::StatusCode, Json};
use newswatcher_core::SessionClaim;
use uuid::Uuid;

use crate::error::AppError;

// Re-export the router builder and middleware to make them easily accessible
// to the binary that will build the web server.
pub use middleware::require_auth;
pub use rest::build_router;

/// Unwraps a JSON body. Oversized bodies become `PayloadTooLarge`, any other
/// rejection `InvalidInput`.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(rejection.body_text())
        } else {
            AppError::InvalidInput(rejection.body_text())
        }
    })
}

/// Confirms the claim belongs to the user addressed by `path_id`.
pub(crate) fn ensure_owner(claim: &SessionClaim, path_id: &str, action: &str) -> Result<Uuid, AppError> {
    if !claim.owns(path_id) {
        return Err(AppError::Forbidden(format!("Invalid request for {}", action)));
    }
    claim_user_id(claim)
}

/// The claim's user id as a `Uuid`.
pub(crate) fn claim_user_id(claim: &SessionClaim) -> Result<Uuid, AppError> {
    Uuid::parse_str(&claim.user_id)
        .map_err(|_| AppError::Unauthenticated("session names an unknown user id".to_string()))
}
