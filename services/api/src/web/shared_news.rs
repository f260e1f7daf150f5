//! services/api/src/web/shared_news.rs
//!
//! The public shared-news feed: listing, sharing, deleting and commenting.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use newswatcher_core::{validation, Comment, PortError, SessionClaim, SharedStory, Story};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::web::auth::MessageResponse;
use crate::web::state::AppState;
use crate::web::{claim_user_id, json_body};

#[derive(Deserialize, ToSchema)]
pub struct CommentRequest {
    pub comment: String,
}

/// GET /api/sharednews - List every shared story
#[utoipa::path(
    get,
    path = "/api/sharednews",
    tag = "sharedNews",
    responses((status = 200, description = "All shared stories with their comments")),
    security(("x-auth" = []))
)]
pub async fn list_shared_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let stories = state.db.list_shared_stories().await?;
    Ok((StatusCode::OK, Json(stories)))
}

/// POST /api/sharednews - Share a story
#[utoipa::path(
    post,
    path = "/api/sharednews",
    tag = "sharedNews",
    request_body(content_type = "application/json", description = "The story to share."),
    responses(
        (status = 201, description = "The new shared story"),
        (status = 406, description = "Invalid story"),
        (status = 409, description = "Share limit reached or story already shared")
    ),
    security(("x-auth" = []))
)]
pub async fn share_story_handler(
    State(state): State<Arc<AppState>>,
    Extension(claim): Extension<SessionClaim>,
    payload: Result<Json<Story>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let story = json_body(payload)?;
    validation::validate_story(&story)?;
    let user_id = claim_user_id(&claim)?;

    // Both checks are advisory; the insert below enforces storyID uniqueness.
    if state.db.count_shared_stories().await? >= state.config.limits.max_shared_stories {
        return Err(AppError::ShareLimitReached);
    }
    match state.db.get_shared_story(&story.story_id).await {
        Ok(_) => return Err(AppError::AlreadyShared),
        Err(PortError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    let seed = Comment {
        display_name: claim.display_name.clone(),
        user_id,
        date_time: Utc::now(),
        text: format!("{} thought everyone might enjoy this!", claim.display_name),
    };
    let shared = SharedStory {
        story,
        comments: vec![seed],
    };
    let shared = match state.db.insert_shared_story(shared).await {
        Ok(shared) => shared,
        Err(PortError::Conflict(_)) => return Err(AppError::AlreadyShared),
        Err(e) => return Err(e.into()),
    };

    info!(story_id = %shared.story_id(), user_id = %user_id, "Story shared");
    Ok((StatusCode::CREATED, Json(shared)))
}

/// DELETE /api/sharednews/{sid} - Remove a shared story
///
/// Any logged in user may remove any shared story.
#[utoipa::path(
    delete,
    path = "/api/sharednews/{sid}",
    tag = "sharedNews",
    params(("sid" = String, Path, description = "The storyID of the shared story")),
    responses(
        (status = 200, description = "Story deleted", body = MessageResponse),
        (status = 404, description = "No such shared story"),
        (status = 409, description = "Deletion failure")
    ),
    security(("x-auth" = []))
)]
pub async fn delete_shared_handler(
    State(state): State<Arc<AppState>>,
    Extension(claim): Extension<SessionClaim>,
    Path(story_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.db.get_shared_story(&story_id).await?;

    let removed = state.db.delete_shared_story(&story_id).await?;
    if removed != 1 {
        return Err(AppError::DeletionFailure);
    }

    info!(story_id = %story_id, user_id = %claim.user_id, "Shared story deleted");
    Ok((StatusCode::OK, MessageResponse::new("Story Deleted")))
}

/// POST /api/sharednews/{sid}/comments - Comment on a shared story
#[utoipa::path(
    post,
    path = "/api/sharednews/{sid}/comments",
    tag = "sharedNews",
    params(("sid" = String, Path, description = "The storyID of the shared story")),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "The shared story with the new comment"),
        (status = 404, description = "No such shared story"),
        (status = 406, description = "Invalid comment"),
        (status = 409, description = "Comment limit reached")
    ),
    security(("x-auth" = []))
)]
pub async fn add_comment_handler(
    State(state): State<Arc<AppState>>,
    Extension(claim): Extension<SessionClaim>,
    Path(story_id): Path<String>,
    payload: Result<Json<CommentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = json_body(payload)?;
    validation::validate_comment(&req.comment)?;
    let user_id = claim_user_id(&claim)?;

    let max_comments = state.config.limits.max_comments;
    let current = state.db.get_shared_story(&story_id).await?;
    if current.comments.len() >= max_comments {
        return Err(AppError::CommentLimitReached);
    }

    let comment = Comment {
        display_name: claim.display_name.clone(),
        user_id,
        date_time: Utc::now(),
        text: validation::truncate_comment(&req.comment),
    };
    // The story existed and had room a moment ago, so a miss here means
    // another writer got in between.
    let updated = state
        .db
        .append_comment(&story_id, comment, max_comments)
        .await?
        .ok_or_else(|| {
            AppError::ContentionFailure(format!("comment on shared story {}", story_id))
        })?;
    Ok((StatusCode::CREATED, Json(updated)))
}
