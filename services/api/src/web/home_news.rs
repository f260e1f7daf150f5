//! services/api/src/web/home_news.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use newswatcher_core::PortError;
use std::sync::Arc;

use crate::error::AppError;
use crate::web::state::AppState;

/// GET /api/homenews - Stories for the public home page
#[utoipa::path(
    get,
    path = "/api/homenews",
    tag = "homeNews",
    responses(
        (status = 200, description = "The home page stories"),
        (status = 404, description = "The home news document has not been written yet")
    )
)]
pub async fn home_news_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let home = match state.db.get_home_news(&state.config.home_news_id).await {
        Ok(home) => home,
        Err(PortError::NotFound(_)) => {
            return Err(AppError::NotFound("Home news not found".to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    Ok((StatusCode::OK, Json(home.home_news_stories)))
}
