//! services/api/src/web/users.rs
//!
//! Account endpoints: registration, self-service profile reads and updates,
//! account deletion and the saved-story list.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use newswatcher_core::{
    validation, NewUser, NewsFilter, PortError, SessionClaim, Settings, Story, WorkerEvent,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::web::auth::{hash_password, MessageResponse};
use crate::web::state::AppState;
use crate::web::{ensure_owner, json_body};

//=========================================================================================
// Request Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub display_name: String,
    pub email: String,
    pub password: String,
}

/// The replaceable part of a profile.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[schema(value_type = Object)]
    pub settings: Settings,
    #[schema(value_type = Vec<Object>)]
    pub news_filters: Vec<NewsFilter>,
}

const NO_CACHE_HEADERS: [(header::HeaderName, &str); 3] = [
    (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
    (header::PRAGMA, "no-cache"),
    (header::EXPIRES, "0"),
];

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/users - Register a new account
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created; the stored user document"),
        (status = 405, description = "Email account already registered"),
        (status = 406, description = "Invalid field")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = json_body(payload)?;
    validation::validate_registration(&req.display_name, &req.email, &req.password).map_err(
        |e| {
            AppError::InvalidInput(format!(
                "{}: display name 3 to 50 alphanumeric, valid email and password 7 to 15 (one number, one special character)",
                e
            ))
        },
    )?;

    // Cheap early answer; the unique constraint on email is the real guard.
    match state.db.get_user_by_email(&req.email).await {
        Ok(_) => return Err(AppError::EmailTaken),
        Err(PortError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    let password_hash = hash_password(&req.password)?;
    let new_user = NewUser::with_defaults(req.display_name, req.email, password_hash);
    let user = match state.db.create_user(new_user).await {
        Ok(user) => user,
        Err(PortError::Conflict(_)) => return Err(AppError::EmailTaken),
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, "Registered new user");
    state.notifier.notify(WorkerEvent::RefreshStories {
        document: user.clone(),
    });
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/users/{id} - Fetch the caller's own profile
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "The caller's user id")),
    responses(
        (status = 200, description = "The public profile"),
        (status = 404, description = "User no longer exists"),
        (status = 407, description = "Id does not match the session")
    ),
    security(("x-auth" = []))
)]
pub async fn get_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(claim): Extension<SessionClaim>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = ensure_owner(&claim, &id, "account fetch")?;
    let user = state.db.get_user(user_id).await?;
    Ok((StatusCode::OK, NO_CACHE_HEADERS, Json(user)))
}

/// PUT /api/users/{id} - Replace settings and news filters
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "The caller's user id")),
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "The updated user document"),
        (status = 406, description = "A filter failed validation"),
        (status = 407, description = "Id does not match the session"),
        (status = 408, description = "Too many news filters")
    ),
    security(("x-auth" = []))
)]
pub async fn update_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(claim): Extension<SessionClaim>,
    Path(id): Path<String>,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = ensure_owner(&claim, &id, "account update")?;
    let mut update = json_body(payload)?;

    let max_filters = state.config.limits.max_filters;
    if update.news_filters.len() > max_filters {
        return Err(AppError::TooManyFilters(max_filters));
    }

    for filter in update.news_filters.iter_mut() {
        validation::trim_keywords(filter);
        validation::validate_filter(filter).map_err(|e| {
            AppError::InvalidInput(format!("Invalid filter '{}': {}", filter.name, e))
        })?;
    }

    let user = state
        .db
        .replace_profile(user_id, update.settings, update.news_filters)
        .await?;

    info!(user_id = %user.id, filters = user.news_filters.len(), "Profile replaced");
    state.notifier.notify(WorkerEvent::RefreshStories {
        document: user.clone(),
    });
    Ok((StatusCode::OK, Json(user)))
}

/// DELETE /api/users/{id} - Delete the caller's account
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "The caller's user id")),
    responses(
        (status = 200, description = "Account deleted", body = MessageResponse),
        (status = 404, description = "User no longer exists"),
        (status = 407, description = "Id does not match the session"),
        (status = 409, description = "Account deletion failure")
    ),
    security(("x-auth" = []))
)]
pub async fn delete_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(claim): Extension<SessionClaim>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = ensure_owner(&claim, &id, "account deletion")?;
    state.db.get_user(user_id).await?;

    let removed = state.db.delete_user(user_id).await?;
    if removed != 1 {
        return Err(AppError::AccountDeletionFailure);
    }

    info!(user_id = %user_id, "Account deleted");
    Ok((StatusCode::OK, MessageResponse::new("User Deleted")))
}

/// POST /api/users/{id}/savedstories - Save a story to the caller's list
#[utoipa::path(
    post,
    path = "/api/users/{id}/savedstories",
    tag = "users",
    params(("id" = String, Path, description = "The caller's user id")),
    request_body(content_type = "application/json", description = "The story to save."),
    responses(
        (status = 200, description = "The updated saved-story list"),
        (status = 404, description = "User no longer exists"),
        (status = 406, description = "Invalid story"),
        (status = 407, description = "Id does not match the session"),
        (status = 409, description = "Over the save limit, or story already saved")
    ),
    security(("x-auth" = []))
)]
pub async fn add_saved_story_handler(
    State(state): State<Arc<AppState>>,
    Extension(claim): Extension<SessionClaim>,
    Path(id): Path<String>,
    payload: Result<Json<Story>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = ensure_owner(&claim, &id, "saving a story")?;
    let story = json_body(payload)?;
    validation::validate_story(&story)?;

    // Tells "no such user" apart from a failed conditional append below.
    state.db.get_user(user_id).await?;

    let user = state
        .db
        .add_saved_story(user_id, story, state.config.limits.max_saved_stories)
        .await?
        .ok_or(AppError::SaveLimitReached)?;
    Ok((StatusCode::OK, Json(user.saved_stories)))
}

/// DELETE /api/users/{id}/savedstories/{sid} - Remove a saved story
#[utoipa::path(
    delete,
    path = "/api/users/{id}/savedstories/{sid}",
    tag = "users",
    params(
        ("id" = String, Path, description = "The caller's user id"),
        ("sid" = String, Path, description = "The storyID to remove")
    ),
    responses(
        (status = 200, description = "The user document as it was before the removal"),
        (status = 404, description = "User no longer exists"),
        (status = 407, description = "Id does not match the session")
    ),
    security(("x-auth" = []))
)]
pub async fn remove_saved_story_handler(
    State(state): State<Arc<AppState>>,
    Extension(claim): Extension<SessionClaim>,
    Path((id, story_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = ensure_owner(&claim, &id, "removing a story")?;
    let before = state
        .db
        .remove_saved_story(user_id, &story_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
    Ok((StatusCode::OK, Json(before)))
}
